use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::{Show, ShowRecord, UpsertShow, STATUS_PUBLISH};
use crate::error::{AppError, AppResult};

/// Repository for the content store `shows` table.
pub struct ShowRepository;

impl ShowRepository {
    /// Published shows whose `calendar_id` is one of `calendar_ids`.
    ///
    /// Rows come back in creation order so callers that index them by id see a
    /// stable "last one wins" result.
    pub async fn find_published_by_calendar_ids(
        pool: &SqlitePool,
        calendar_ids: &BTreeSet<String>,
    ) -> AppResult<Vec<ShowRecord>> {
        if calendar_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                calendar_id AS content_id,
                slug,
                entry_id,
                title,
                schedule_text,
                banner_image_url,
                thumbnail_url
            FROM shows
            WHERE status = "#,
        );
        query.push_bind(STATUS_PUBLISH);
        query.push(" AND calendar_id IN (");
        let mut separated = query.separated(", ");
        for id in calendar_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY created_at, entry_id");

        query
            .build_query_as::<ShowRecord>()
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Show>> {
        sqlx::query_as::<_, Show>(
            r#"
            SELECT
                entry_id, calendar_id, slug, title, schedule_text,
                banner_image_url, thumbnail_url, status, created_at, updated_at
            FROM shows
            ORDER BY created_at, entry_id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Create or replace the show identified by `entry_id`.
    pub async fn upsert(pool: &SqlitePool, entry_id: &str, show: UpsertShow) -> AppResult<Show> {
        let now = Utc::now().naive_utc();
        let status = show.status.unwrap_or_else(|| STATUS_PUBLISH.to_string());

        sqlx::query_as::<_, Show>(
            r#"
            INSERT INTO shows (
                entry_id, calendar_id, slug, title, schedule_text,
                banner_image_url, thumbnail_url, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(entry_id) DO UPDATE SET
                calendar_id = excluded.calendar_id,
                slug = excluded.slug,
                title = excluded.title,
                schedule_text = excluded.schedule_text,
                banner_image_url = excluded.banner_image_url,
                thumbnail_url = excluded.thumbnail_url,
                status = excluded.status,
                updated_at = excluded.updated_at
            RETURNING
                entry_id, calendar_id, slug, title, schedule_text,
                banner_image_url, thumbnail_url, status, created_at, updated_at
            "#,
        )
        .bind(entry_id)
        .bind(show.calendar_id)
        .bind(show.slug)
        .bind(show.title)
        .bind(show.schedule_text)
        .bind(show.banner_image_url)
        .bind(show.thumbnail_url)
        .bind(status)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a show. Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, entry_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shows WHERE entry_id = ?")
            .bind(entry_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn show(calendar_id: &str, slug: &str, status: Option<&str>) -> UpsertShow {
        UpsertShow {
            calendar_id: calendar_id.to_string(),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            schedule_text: Some("Mondays 7-9pm".to_string()),
            banner_image_url: None,
            thumbnail_url: Some(format!("https://img.example/{slug}.jpg")),
            status: status.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn lookup_returns_only_published_matches() {
        let pool = test_pool().await;
        ShowRepository::upsert(&pool, "101", show("12", "night-owls", None))
            .await
            .unwrap();
        ShowRepository::upsert(&pool, "102", show("7", "draft-show", Some("draft")))
            .await
            .unwrap();
        ShowRepository::upsert(&pool, "103", show("99", "other", None))
            .await
            .unwrap();

        let ids: BTreeSet<String> = ["0", "12", "7"].iter().map(|s| s.to_string()).collect();
        let found = ShowRepository::find_published_by_calendar_ids(&pool, &ids)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content_id, "12");
        assert_eq!(found[0].slug, "night-owls");
        assert_eq!(found[0].entry_id, "101");
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_removes() {
        let pool = test_pool().await;
        ShowRepository::upsert(&pool, "101", show("12", "night-owls", None))
            .await
            .unwrap();
        let updated = ShowRepository::upsert(&pool, "101", show("13", "early-birds", None))
            .await
            .unwrap();
        assert_eq!(updated.calendar_id, "13");
        assert_eq!(ShowRepository::list_all(&pool).await.unwrap().len(), 1);

        assert!(ShowRepository::delete(&pool, "101").await.unwrap());
        assert!(!ShowRepository::delete(&pool, "101").await.unwrap());
    }
}
