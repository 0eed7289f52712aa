use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::services::enrich::EnrichedEvent;
use crate::services::format::{clock_time, date_label, timestamp_ms};

/// An event reduced to what the frontend renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEvent {
    pub title: String,
    pub start_time_text: String,
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_image_url: Option<String>,
}

/// Events of one local day, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date_label: String,
    pub events: Vec<DisplayEvent>,
}

impl DisplayEvent {
    fn project(enriched: &EnrichedEvent, zone: Tz) -> Self {
        let event = &enriched.event;
        let show = enriched.show.as_ref();

        Self {
            title: event.summary.clone(),
            start_time_text: clock_time(&event.start, zone),
            start_timestamp_ms: timestamp_ms(&event.start),
            end_timestamp_ms: timestamp_ms(&event.end),
            content_id: show.map(|s| s.content_id.clone()),
            slug: show.map(|s| s.slug.clone()),
            entry_id: show.map(|s| s.entry_id.clone()),
            banner_image_url: show.and_then(|s| s.banner_image_url.clone()),
        }
    }
}

/// Group start-ordered events into per-day buckets.
///
/// The first two days are always kept; after that at most `day_limit - 2`
/// further day changes open a new bucket. The first day change past the budget
/// ends ingestion, dropping every remaining event.
pub fn group(events: &[EnrichedEvent], day_limit: i64, zone: Tz) -> Vec<DayBucket> {
    let limit = day_limit - 2;
    let mut buckets: Vec<DayBucket> = Vec::new();
    let mut i: i64 = 0;

    for enriched in events {
        let label = date_label(&enriched.event.start, zone);
        let display = DisplayEvent::project(enriched, zone);

        match buckets.last_mut() {
            None => buckets.push(DayBucket {
                date_label: label,
                events: vec![display],
            }),
            Some(current) if current.date_label == label => current.events.push(display),
            Some(_) => {
                if i > limit {
                    break;
                }
                buckets.push(DayBucket {
                    date_label: label,
                    events: vec![display],
                });
                i += 1;
            }
        }
    }

    buckets
}
