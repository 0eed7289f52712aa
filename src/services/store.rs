//! Store abstractions the refresh pipeline writes to and reads from, and their
//! SQLite-backed implementations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::{OptionRepository, ShowRecord, ShowRepository};
use crate::error::AppResult;

/// Cache key of the day-grouped calendar view.
pub const CALENDAR_EVENTS_KEY: &str = "calendar_events";
/// Cache key of the sorted upcoming-shows view.
pub const UPCOMING_SHOWS_KEY: &str = "upcoming_shows";

/// Published content entries, queryable by calendar identifier.
#[async_trait]
pub trait ShowDirectory: Send + Sync {
    async fn find_published(&self, calendar_ids: &BTreeSet<String>) -> AppResult<Vec<ShowRecord>>;
}

/// Key-value persistence for serialized views.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
}

pub struct SqliteShowDirectory<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SqliteShowDirectory<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShowDirectory for SqliteShowDirectory<'_> {
    async fn find_published(&self, calendar_ids: &BTreeSet<String>) -> AppResult<Vec<ShowRecord>> {
        ShowRepository::find_published_by_calendar_ids(self.pool, calendar_ids).await
    }
}

pub struct SqliteCacheStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SqliteCacheStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore<'_> {
    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        OptionRepository::set(self.pool, key, value).await
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(OptionRepository::get(self.pool, key).await?.map(|o| o.value))
    }
}
