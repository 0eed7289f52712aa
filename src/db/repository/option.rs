use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::StoredOption;
use crate::error::{AppError, AppResult};

/// Repository for the key-value `options` table.
pub struct OptionRepository;

impl OptionRepository {
    pub async fn get(pool: &SqlitePool, name: &str) -> AppResult<Option<StoredOption>> {
        sqlx::query_as::<_, StoredOption>(
            r#"
            SELECT name, value, updated_at
            FROM options
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Insert or overwrite a value. Last writer wins.
    pub async fn set(pool: &SqlitePool, name: &str, value: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO options (name, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
