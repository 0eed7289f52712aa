use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::CalendarConfig;
use crate::db::OptionRepository;
use crate::error::AppResult;

pub const API_KEY_OPTION: &str = "provider_api_key";
pub const CALENDAR_ID_OPTION: &str = "calendar_id";
pub const DAY_WINDOW_OPTION: &str = "day_window";

lazy_static::lazy_static! {
    static ref MARKUP_TAG: Regex = Regex::new(r"<[^>]*(>|$)").expect("valid tag pattern");
}

/// Calendar settings editable through the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSettings {
    pub api_key: Option<String>,
    pub calendar_id: Option<String>,
    pub day_window: u32,
}

/// Submitted admin form. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettings {
    pub api_key: Option<String>,
    pub calendar_id: Option<String>,
    pub day_window: Option<String>,
}

pub struct SettingsService;

impl SettingsService {
    /// Trim surrounding whitespace and drop markup tags.
    pub fn sanitize(value: &str) -> String {
        MARKUP_TAG.replace_all(value.trim(), "").into_owned()
    }

    /// Parse a day window; only a plain run of digits is accepted.
    pub fn parse_day_window(value: &str) -> Option<u32> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        value.parse().ok()
    }

    /// Stored settings, falling back to environment defaults for anything not saved.
    pub async fn load(pool: &SqlitePool, defaults: &CalendarConfig) -> AppResult<CalendarSettings> {
        let api_key = OptionRepository::get(pool, API_KEY_OPTION)
            .await?
            .map(|o| o.value)
            .or_else(|| defaults.api_key.clone())
            .filter(|v| !v.is_empty());
        let calendar_id = OptionRepository::get(pool, CALENDAR_ID_OPTION)
            .await?
            .map(|o| o.value)
            .or_else(|| defaults.calendar_id.clone())
            .filter(|v| !v.is_empty());
        let day_window = OptionRepository::get(pool, DAY_WINDOW_OPTION)
            .await?
            .and_then(|o| Self::parse_day_window(&o.value))
            .unwrap_or(defaults.default_day_window);

        Ok(CalendarSettings {
            api_key,
            calendar_id,
            day_window,
        })
    }

    /// Apply a submitted form and return the resulting settings.
    ///
    /// A day window that is not a non-negative integer is ignored and the
    /// previous value kept.
    pub async fn update(
        pool: &SqlitePool,
        defaults: &CalendarConfig,
        update: UpdateSettings,
    ) -> AppResult<CalendarSettings> {
        if let Some(ref api_key) = update.api_key {
            OptionRepository::set(pool, API_KEY_OPTION, &Self::sanitize(api_key)).await?;
        }

        if let Some(ref calendar_id) = update.calendar_id {
            OptionRepository::set(pool, CALENDAR_ID_OPTION, &Self::sanitize(calendar_id)).await?;
        }

        if let Some(ref day_window) = update.day_window {
            let cleaned = Self::sanitize(day_window);
            match Self::parse_day_window(&cleaned) {
                Some(days) => {
                    OptionRepository::set(pool, DAY_WINDOW_OPTION, &days.to_string()).await?
                }
                None => tracing::debug!("Ignoring non-numeric day window {:?}", cleaned),
            }
        }

        Self::load(pool, defaults).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;

    #[test]
    fn sanitize_trims_and_strips_tags() {
        assert_eq!(SettingsService::sanitize("  abc@group  "), "abc@group");
        assert_eq!(SettingsService::sanitize("<b>key</b>123"), "key123");
        assert_eq!(SettingsService::sanitize("abc<script"), "abc");
        assert_eq!(SettingsService::sanitize("abc<script src=x"), "abc");
    }

    #[test]
    fn day_window_must_be_plain_digits() {
        assert_eq!(SettingsService::parse_day_window("8"), Some(8));
        assert_eq!(SettingsService::parse_day_window("0"), Some(0));
        assert_eq!(SettingsService::parse_day_window("-1"), None);
        assert_eq!(SettingsService::parse_day_window("7.5"), None);
        assert_eq!(SettingsService::parse_day_window("seven"), None);
        assert_eq!(SettingsService::parse_day_window(""), None);
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults() {
        let pool = test_pool().await;
        let mut defaults = Config::default().calendar;
        defaults.calendar_id = Some("env-calendar".to_string());

        let settings = SettingsService::load(&pool, &defaults).await.unwrap();
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.calendar_id.as_deref(), Some("env-calendar"));
        assert_eq!(settings.day_window, 8);
    }

    #[tokio::test]
    async fn invalid_day_window_keeps_previous_value() {
        let pool = test_pool().await;
        let defaults = Config::default().calendar;

        let saved = SettingsService::update(
            &pool,
            &defaults,
            UpdateSettings {
                api_key: Some(" secret ".to_string()),
                calendar_id: Some("station@group.calendar.google.com".to_string()),
                day_window: Some("5".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.api_key.as_deref(), Some("secret"));
        assert_eq!(saved.day_window, 5);

        let after = SettingsService::update(
            &pool,
            &defaults,
            UpdateSettings {
                day_window: Some("five".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(after.day_window, 5);
        assert_eq!(after.calendar_id.as_deref(), Some("station@group.calendar.google.com"));
    }
}
