use std::collections::{BTreeSet, HashMap};

use crate::db::ShowRecord;
use crate::error::AppResult;
use crate::services::format::{candidate_id, show_id};
use crate::services::google_calendar::RawEvent;
use crate::services::store::ShowDirectory;

/// A raw event with the show it advertises, when its description names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedEvent {
    pub event: RawEvent,
    pub show: Option<ShowRecord>,
}

/// Identifiers to look up for `events`: each event's show id, or the
/// no-show sentinel.
pub fn candidate_ids(events: &[RawEvent]) -> BTreeSet<String> {
    events
        .iter()
        .map(|e| candidate_id(&e.description).to_string())
        .collect()
}

/// One batched directory lookup for every show the events may reference.
///
/// No events means no lookup.
pub async fn lookup_shows(
    directory: &dyn ShowDirectory,
    events: &[RawEvent],
) -> AppResult<Vec<ShowRecord>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let ids = candidate_ids(events);
    let shows = directory.find_published(&ids).await?;
    tracing::debug!(
        "Show directory returned {} records for {} candidate ids",
        shows.len(),
        ids.len()
    );
    Ok(shows)
}

/// Index shows by calendar identifier. A later record replaces an earlier one
/// with the same id.
pub fn index_shows(shows: &[ShowRecord]) -> HashMap<&str, &ShowRecord> {
    shows.iter().map(|s| (s.content_id.as_str(), s)).collect()
}

/// Attach to each event the show whose calendar identifier equals its
/// description. Events without a match pass through unchanged.
pub fn enrich(events: Vec<RawEvent>, shows: &[ShowRecord]) -> Vec<EnrichedEvent> {
    let index = index_shows(shows);

    events
        .into_iter()
        .map(|event| {
            let show = show_id(&event.description)
                .and_then(|id| index.get(id))
                .map(|s| (*s).clone());
            EnrichedEvent { event, show }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::DateTime;

    pub(crate) fn raw(description: &str, start: &str) -> RawEvent {
        let start = DateTime::parse_from_rfc3339(start).unwrap();
        RawEvent {
            summary: format!("Event {description}"),
            description: description.to_string(),
            start,
            end: start + chrono::Duration::hours(2),
        }
    }

    pub(crate) fn show(content_id: &str, slug: &str) -> ShowRecord {
        ShowRecord {
            content_id: content_id.to_string(),
            slug: slug.to_string(),
            entry_id: format!("post-{content_id}"),
            title: slug.replace('-', " "),
            schedule_text: Some("Weekly".to_string()),
            banner_image_url: Some(format!("https://img.example/{slug}-banner.jpg")),
            thumbnail_url: Some(format!("https://img.example/{slug}-card.jpg")),
        }
    }

    #[test]
    fn candidates_include_sentinel_for_free_text() {
        let events = vec![
            raw("12", "2024-06-03T19:00:00-04:00"),
            raw("Open mic", "2024-06-03T21:00:00-04:00"),
            raw("12", "2024-06-04T19:00:00-04:00"),
        ];
        let ids: Vec<String> = candidate_ids(&events).into_iter().collect();
        assert_eq!(ids, vec!["0".to_string(), "12".to_string()]);
    }

    #[test]
    fn attaches_only_exact_numeric_matches() {
        let events = vec![
            raw("12", "2024-06-03T19:00:00-04:00"),
            raw("abc", "2024-06-03T20:00:00-04:00"),
            raw("12.5", "2024-06-03T21:00:00-04:00"),
            raw(" 12", "2024-06-03T22:00:00-04:00"),
        ];
        let shows = vec![show("12", "night-owls")];

        let enriched = enrich(events, &shows);

        assert_eq!(enriched[0].show.as_ref().map(|s| s.slug.as_str()), Some("night-owls"));
        assert!(enriched[1].show.is_none());
        assert!(enriched[2].show.is_none());
        assert!(enriched[3].show.is_none());
    }

    #[test]
    fn no_records_passes_events_through() {
        let events = vec![raw("5", "2024-06-03T10:00:00-04:00")];
        let enriched = enrich(events.clone(), &[]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].event, events[0]);
        assert!(enriched[0].show.is_none());
    }

    #[test]
    fn duplicate_ids_last_record_wins() {
        let events = vec![raw("5", "2024-06-03T10:00:00-04:00")];
        let shows = vec![show("5", "first"), show("5", "second")];
        let enriched = enrich(events, &shows);
        assert_eq!(enriched[0].show.as_ref().unwrap().slug, "second");
    }

    struct PanickingDirectory;

    #[async_trait::async_trait]
    impl ShowDirectory for PanickingDirectory {
        async fn find_published(&self, _: &BTreeSet<String>) -> AppResult<Vec<ShowRecord>> {
            panic!("lookup must not run for an empty event list");
        }
    }

    #[tokio::test]
    async fn empty_input_skips_lookup() {
        let shows = lookup_shows(&PanickingDirectory, &[]).await.unwrap();
        assert!(shows.is_empty());
        assert!(enrich(Vec::new(), &shows).is_empty());
    }
}
