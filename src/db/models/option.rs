use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named value in the `options` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredOption {
    pub name: String,
    pub value: String,
    pub updated_at: NaiveDateTime,
}
