use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::services::enrich::{enrich, lookup_shows};
use crate::services::google_calendar::{EventFetcher, FetchWindow, GoogleCalendarClient};
use crate::services::grouping::group;
use crate::services::schedule::{schedule, UnmatchedPolicy};
use crate::services::settings::SettingsService;
use crate::services::store::{
    CacheStore, ShowDirectory, SqliteCacheStore, SqliteShowDirectory, CALENDAR_EVENTS_KEY,
    UPCOMING_SHOWS_KEY,
};
use crate::AppState;

/// Result of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The provider returned no events; cached views were left as they were.
    Empty,
    Updated {
        events: usize,
        days: usize,
        shows: usize,
    },
}

/// One calendar refresh: fetch, enrich, group and schedule, then overwrite
/// both cached views.
///
/// Any collaborator failure aborts the run before the first cache write.
pub struct CalendarRefresh<'a> {
    pub fetcher: &'a dyn EventFetcher,
    pub directory: &'a dyn ShowDirectory,
    pub cache: &'a dyn CacheStore,
    pub zone: Tz,
    pub max_results: u32,
    pub unmatched_policy: UnmatchedPolicy,
}

impl CalendarRefresh<'_> {
    pub async fn run(
        &self,
        calendar_id: &str,
        window: &FetchWindow,
        day_limit: i64,
    ) -> AppResult<RefreshOutcome> {
        let events = self
            .fetcher
            .fetch(calendar_id, window, self.max_results)
            .await?;

        if events.is_empty() {
            info!(
                "No events between {} and {}; keeping cached calendar",
                window.time_min, window.time_max
            );
            return Ok(RefreshOutcome::Empty);
        }

        let shows = lookup_shows(self.directory, &events).await?;
        let event_count = events.len();
        let enriched = enrich(events, &shows);

        let days = group(&enriched, day_limit, self.zone);
        let upcoming = schedule(&enriched, &shows, self.unmatched_policy);

        let days_json = serde_json::to_string(&days)?;
        let upcoming_json = serde_json::to_string(&upcoming)?;

        self.cache.set(CALENDAR_EVENTS_KEY, &days_json).await?;
        self.cache.set(UPCOMING_SHOWS_KEY, &upcoming_json).await?;

        Ok(RefreshOutcome::Updated {
            events: event_count,
            days: days.len(),
            shows: upcoming.len(),
        })
    }
}

/// Entry point shared by the hourly worker and the admin refresh action.
pub struct CalendarRefreshManager;

impl CalendarRefreshManager {
    pub async fn refresh(state: &Arc<AppState>) -> AppResult<RefreshOutcome> {
        let calendar = &state.config.calendar;
        let settings = SettingsService::load(&state.db, calendar).await?;

        let api_key = settings
            .api_key
            .ok_or_else(|| AppError::Config("Calendar API key is not configured".to_string()))?;
        let calendar_id = settings
            .calendar_id
            .ok_or_else(|| AppError::Config("Calendar id is not configured".to_string()))?;

        let window = FetchWindow::starting_today(calendar.timezone, Utc::now(), settings.day_window)?;
        info!(
            "Refreshing calendar {} for {} days from {}",
            calendar_id, settings.day_window, window.time_min
        );

        let fetcher = GoogleCalendarClient::new(
            state.http.clone(),
            &calendar.api_url,
            &api_key,
            calendar.timezone,
        );
        let directory = SqliteShowDirectory::new(&state.db);
        let cache = SqliteCacheStore::new(&state.db);

        let refresh = CalendarRefresh {
            fetcher: &fetcher,
            directory: &directory,
            cache: &cache,
            zone: calendar.timezone,
            max_results: calendar.max_results,
            unmatched_policy: calendar.unmatched_policy,
        };

        match refresh
            .run(&calendar_id, &window, i64::from(settings.day_window))
            .await
        {
            Ok(outcome) => {
                info!("Calendar refresh finished: {:?}", outcome);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Calendar refresh failed; cached views left unchanged: {}", e);
                Err(e)
            }
        }
    }
}
