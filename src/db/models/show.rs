use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Content store models
// ============================================================================

/// Publication status for a show entry. Only published entries are visible to
/// the calendar pipeline.
pub const STATUS_PUBLISH: &str = "publish";

/// Full row of the `shows` table, as managed through the admin API.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Show {
    pub entry_id: String,
    pub calendar_id: String,
    pub slug: String,
    pub title: String,
    pub schedule_text: Option<String>,
    pub banner_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertShow {
    pub calendar_id: String,
    pub slug: String,
    pub title: String,
    pub schedule_text: Option<String>,
    pub banner_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<String>,
}

/// A published show as seen by the calendar pipeline.
///
/// `content_id` is the show's calendar identifier: the value an event
/// description must carry for the show to be attached to it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowRecord {
    pub content_id: String,
    pub slug: String,
    pub entry_id: String,
    pub title: String,
    pub schedule_text: Option<String>,
    pub banner_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}
