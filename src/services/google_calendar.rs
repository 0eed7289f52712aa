use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, AppResult};

// ============================================================================
// Event Types
// ============================================================================

/// A calendar event as returned by the provider, reduced to the fields the
/// pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub summary: String,
    /// Free text. Carries a show's calendar identifier when it is purely numeric.
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date_time: Option<String>,
    /// Set instead of `date_time` for all-day events.
    date: Option<String>,
}

// ============================================================================
// Fetch window
// ============================================================================

/// The `[today 00:00, today + N days 00:00]` interval requested from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub time_min: DateTime<FixedOffset>,
    pub time_max: DateTime<FixedOffset>,
}

impl FetchWindow {
    /// Window of `days` days starting at local midnight of the day containing `now`.
    pub fn starting_today(zone: Tz, now: DateTime<Utc>, days: u32) -> AppResult<Self> {
        let today = now.with_timezone(&zone).date_naive();
        let last_day = today.checked_add_days(Days::new(u64::from(days))).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Window of {} days from {} overflows", days, today))
        })?;

        // Both ends are local midnights, so a DST change inside the window
        // shows up as a different offset on `time_max`.
        Ok(Self {
            time_min: local_midnight(zone, today)?,
            time_max: local_midnight(zone, last_day)?,
        })
    }
}

fn local_midnight(zone: Tz, date: NaiveDate) -> AppResult<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| zone.from_local_datetime(&midnight).earliest())
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("No local midnight for {} in {}", date, zone))
        })
}

// ============================================================================
// Fetcher
// ============================================================================

/// Source of raw calendar events.
///
/// Implementations return single (expanded) occurrences ordered by start time,
/// which the grouping step relies on.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch(
        &self,
        calendar_id: &str,
        window: &FetchWindow,
        max_results: u32,
    ) -> AppResult<Vec<RawEvent>>;
}

/// Read-only client for the Google Calendar v3 `events.list` endpoint,
/// authenticated with an API key (the calendar must be public).
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    api_url: String,
    api_key: String,
    zone: Tz,
}

impl GoogleCalendarClient {
    pub fn new(client: Client, api_url: &str, api_key: &str, zone: Tz) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            zone,
        }
    }

    fn events_url(&self, calendar_id: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| AppError::Config(format!("Invalid calendar API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("Calendar API URL cannot be a base".to_string()))?
            .push("calendars")
            .push(calendar_id)
            .push("events");
        Ok(url)
    }

    /// Send a request, retrying rate limits, server errors and network failures
    /// with exponential backoff.
    async fn send_with_backoff<F>(&self, make_request: F) -> AppResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        const MAX_RETRIES: usize = 4;
        let mut backoff_secs: u64 = 1;
        let max_backoff_secs: u64 = 30;

        for attempt in 0..MAX_RETRIES {
            match (make_request)().send().await {
                Ok(resp) => {
                    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || resp.status().is_server_error()
                    {
                        let mut wait_secs = backoff_secs;
                        if let Some(h) = resp.headers().get("retry-after") {
                            if let Ok(s) = h.to_str() {
                                if let Ok(parsed) = s.parse::<u64>() {
                                    wait_secs = parsed.min(max_backoff_secs);
                                }
                            }
                        }

                        tracing::warn!(
                            "Transient calendar API error (status: {}). Retrying in {}s (attempt {}/{})",
                            resp.status(),
                            wait_secs,
                            attempt + 1,
                            MAX_RETRIES
                        );

                        if attempt + 1 >= MAX_RETRIES {
                            let err_text = resp.text().await.unwrap_or_default();
                            return Err(AppError::CalendarApi(format!(
                                "Failed after {} attempts: {}",
                                attempt + 1,
                                err_text
                            )));
                        }

                        tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;
                        backoff_secs = std::cmp::min(backoff_secs * 2, max_backoff_secs);
                        continue;
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if attempt + 1 >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "Calendar request failed: {}. Retrying in {}s (attempt {}/{})",
                        e,
                        backoff_secs,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                    backoff_secs = std::cmp::min(backoff_secs * 2, max_backoff_secs);
                }
            }
        }

        Err(AppError::CalendarApi("Retries exhausted".to_string()))
    }
}

#[async_trait]
impl EventFetcher for GoogleCalendarClient {
    async fn fetch(
        &self,
        calendar_id: &str,
        window: &FetchWindow,
        max_results: u32,
    ) -> AppResult<Vec<RawEvent>> {
        let url = self.events_url(calendar_id)?;
        let time_min = window.time_min.to_rfc3339();
        let time_max = window.time_max.to_rfc3339();
        let max_results = max_results.to_string();

        let response = self
            .send_with_backoff(|| {
                self.client.get(url.clone()).query(&[
                    ("key", self.api_key.as_str()),
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("orderBy", "startTime"),
                    ("singleEvents", "true"),
                ])
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::CalendarApi(format!(
                "Failed to list events ({}): {}",
                status, error_text
            )));
        }

        let body: EventsResponse = response.json().await.map_err(|e| {
            AppError::CalendarApi(format!("Failed to parse events response: {}", e))
        })?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| from_google_event(item, self.zone))
            .collect())
    }
}

fn from_google_event(item: GoogleEvent, zone: Tz) -> Option<RawEvent> {
    let start = match item.start.as_ref().and_then(|t| parse_event_time(t, zone)) {
        Some(dt) => dt,
        None => {
            tracing::warn!(
                "Skipping calendar event {:?} without a usable start time",
                item.id
            );
            return None;
        }
    };
    let end = item
        .end
        .as_ref()
        .and_then(|t| parse_event_time(t, zone))
        .unwrap_or(start);

    Some(RawEvent {
        summary: item.summary.unwrap_or_default(),
        description: item.description.unwrap_or_default(),
        start,
        end,
    })
}

fn parse_event_time(time: &GoogleEventTime, zone: Tz) -> Option<DateTime<FixedOffset>> {
    if let Some(date_time) = time.date_time.as_deref() {
        return DateTime::parse_from_rfc3339(date_time).ok();
    }
    let date = NaiveDate::parse_from_str(time.date.as_deref()?, "%Y-%m-%d").ok()?;
    local_midnight(zone, date).ok()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn window_starts_at_local_midnight() {
        // 02:30 UTC on June 4th is still June 3rd in New York.
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 2, 30, 0).unwrap();
        let window = FetchWindow::starting_today(chrono_tz::America::New_York, now, 8).unwrap();

        assert_eq!(window.time_min.to_rfc3339(), "2024-06-03T00:00:00-04:00");
        assert_eq!(window.time_max.to_rfc3339(), "2024-06-11T00:00:00-04:00");
    }

    #[test]
    fn window_ends_at_local_midnight_across_dst_changes() {
        // Clocks fall back on Nov 3rd, 2024.
        let now = Utc.with_ymd_and_hms(2024, 10, 30, 16, 0, 0).unwrap();
        let window = FetchWindow::starting_today(chrono_tz::America::New_York, now, 8).unwrap();
        assert_eq!(window.time_min.to_rfc3339(), "2024-10-30T00:00:00-04:00");
        assert_eq!(window.time_max.to_rfc3339(), "2024-11-07T00:00:00-05:00");
        assert_eq!(window.time_max - window.time_min, Duration::hours(8 * 24 + 1));

        // Clocks spring forward on Mar 10th, 2024.
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 16, 0, 0).unwrap();
        let window = FetchWindow::starting_today(chrono_tz::America::New_York, now, 8).unwrap();
        assert_eq!(window.time_min.to_rfc3339(), "2024-03-08T00:00:00-05:00");
        assert_eq!(window.time_max.to_rfc3339(), "2024-03-16T00:00:00-04:00");
    }

    #[test]
    fn converts_timed_and_all_day_events() {
        let body = r#"{
            "items": [
                {
                    "id": "a",
                    "summary": "Night Owls",
                    "description": "12",
                    "start": { "dateTime": "2024-06-03T19:00:00-04:00" },
                    "end": { "dateTime": "2024-06-03T21:00:00-04:00" }
                },
                {
                    "id": "b",
                    "summary": "Fundraiser",
                    "start": { "date": "2024-06-04" },
                    "end": { "date": "2024-06-05" }
                },
                { "id": "c", "summary": "Broken" }
            ]
        }"#;
        let parsed: EventsResponse = serde_json::from_str(body).unwrap();
        let events: Vec<RawEvent> = parsed
            .items
            .into_iter()
            .filter_map(|e| from_google_event(e, chrono_tz::America::New_York))
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].description, "12");
        assert_eq!(events[0].end.to_rfc3339(), "2024-06-03T21:00:00-04:00");
        assert_eq!(events[1].description, "");
        assert_eq!(events[1].start.to_rfc3339(), "2024-06-04T00:00:00-04:00");
    }

    #[test]
    fn calendar_id_is_path_encoded() {
        let client = GoogleCalendarClient::new(
            Client::new(),
            "https://www.googleapis.com/calendar/v3/",
            "key",
            chrono_tz::America::New_York,
        );
        let url = client.events_url("station#events@group.calendar.google.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/station%23events@group.calendar.google.com/events"
        );
    }
}
