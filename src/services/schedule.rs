use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::ShowRecord;
use crate::services::enrich::EnrichedEvent;
use crate::services::format::{show_id, timestamp_ms};

/// A show in the upcoming list, stamped with its earliest start in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub title: String,
    pub schedule_text: Option<String>,
    pub content_id: String,
    pub slug: String,
    pub thumbnail_url: Option<String>,
    /// Unset when no event in the window references the show.
    pub start_timestamp_ms: Option<i64>,
}

impl From<&ShowRecord> for ScheduleEntry {
    fn from(show: &ShowRecord) -> Self {
        Self {
            title: show.title.clone(),
            schedule_text: show.schedule_text.clone(),
            content_id: show.content_id.clone(),
            slug: show.slug.clone(),
            thumbnail_url: show.thumbnail_url.clone(),
            start_timestamp_ms: None,
        }
    }
}

/// What to do with shows that have no occurrence in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Keep them, ordered as if they started at the epoch.
    #[default]
    SortFirst,
    /// Leave them out.
    Drop,
}

impl FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sort-first" | "sort_first" => Ok(UnmatchedPolicy::SortFirst),
            "drop" => Ok(UnmatchedPolicy::Drop),
            other => Err(format!("unknown unmatched policy: {}", other)),
        }
    }
}

/// Build the upcoming-shows list: one entry per show, stamped with the first
/// event that references it, sorted by that time.
pub fn schedule(
    events: &[EnrichedEvent],
    shows: &[ShowRecord],
    policy: UnmatchedPolicy,
) -> Vec<ScheduleEntry> {
    let mut entries: Vec<ScheduleEntry> = shows.iter().map(ScheduleEntry::from).collect();

    for enriched in events {
        let Some(id) = show_id(&enriched.event.description) else {
            continue;
        };
        let start = timestamp_ms(&enriched.event.start);

        for entry in entries.iter_mut().filter(|e| e.content_id == id) {
            if entry.start_timestamp_ms.is_none() {
                entry.start_timestamp_ms = Some(start);
            }
        }
    }

    if policy == UnmatchedPolicy::Drop {
        entries.retain(|e| e.start_timestamp_ms.is_some());
    }

    entries.sort_by_key(|e| e.start_timestamp_ms.unwrap_or(0));
    entries
}
