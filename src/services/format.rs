//! Small helpers shared by the calendar pipeline stages.

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

/// Identifier looked up for events that carry no show.
pub const NO_SHOW_ID: &str = "0";

/// The show identifier carried by an event description, if any.
///
/// Only a non-empty run of ASCII digits counts; signs, decimals and
/// surrounding whitespace disqualify the description.
pub fn show_id(description: &str) -> Option<&str> {
    if !description.is_empty() && description.bytes().all(|b| b.is_ascii_digit()) {
        Some(description)
    } else {
        None
    }
}

/// The identifier sent to the show directory for an event description.
pub fn candidate_id(description: &str) -> &str {
    show_id(description).unwrap_or(NO_SHOW_ID)
}

pub fn timestamp_ms(time: &DateTime<FixedOffset>) -> i64 {
    time.timestamp_millis()
}

/// Day label such as `Mon Jun 3`.
pub fn date_label(time: &DateTime<FixedOffset>, zone: Tz) -> String {
    time.with_timezone(&zone).format("%a %b %-d").to_string()
}

/// Clock time such as `7:00PM`.
pub fn clock_time(time: &DateTime<FixedOffset>, zone: Tz) -> String {
    time.with_timezone(&zone).format("%-I:%M%p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_plain_digit_strings_are_show_ids() {
        assert_eq!(show_id("12"), Some("12"));
        assert_eq!(show_id("007"), Some("007"));
        assert_eq!(show_id("abc"), None);
        assert_eq!(show_id("12.5"), None);
        assert_eq!(show_id(" 12"), None);
        assert_eq!(show_id("12 "), None);
        assert_eq!(show_id("-3"), None);
        assert_eq!(show_id("+3"), None);
        assert_eq!(show_id(""), None);
        assert_eq!(candidate_id("Live from the lobby"), NO_SHOW_ID);
    }

    #[test]
    fn formats_label_and_clock_in_zone() {
        let start = DateTime::parse_from_rfc3339("2024-06-03T19:00:00-04:00").unwrap();
        let zone = chrono_tz::America::New_York;

        assert_eq!(clock_time(&start, zone), "7:00PM");
        assert_eq!(date_label(&start, zone), "Mon Jun 3");
        assert_eq!(timestamp_ms(&start), 1_717_455_600_000);
    }

    #[test]
    fn converts_foreign_offsets_into_zone() {
        // 00:30 UTC on Tuesday is 8:30PM Monday in New York.
        let start = DateTime::parse_from_rfc3339("2024-06-04T00:30:00+00:00").unwrap();
        let zone = chrono_tz::America::New_York;

        assert_eq!(clock_time(&start, zone), "8:30PM");
        assert_eq!(date_label(&start, zone), "Mon Jun 3");
    }
}
