use std::env;

use chrono_tz::Tz;

use crate::services::schedule::UnmatchedPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub calendar: CalendarConfig,
    pub admin: AdminConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS for the public frontend.
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Base URL of the Google Calendar v3 API.
    pub api_url: String,
    /// Fallback API key used until one is saved through the admin settings.
    pub api_key: Option<String>,
    /// Fallback calendar id used until one is saved through the admin settings.
    pub calendar_id: Option<String>,
    /// Zone used for the fetch window, day labels and clock times.
    pub timezone: Tz,
    /// Number of days to fetch and display when no value has been saved.
    pub default_day_window: u32,
    pub max_results: u32,
    pub refresh_interval_seconds: u64,
    pub unmatched_policy: UnmatchedPolicy,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// bcrypt hash of the admin password.
    pub password_hash: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the public read endpoints
    pub public_per_second: u32,
    /// Burst size for the public read endpoints
    pub public_burst: u32,
    /// Allowed requests per second (per IP) for the admin login endpoint
    pub login_per_second: u32,
    /// Burst size for the admin login endpoint
    pub login_burst: u32,
}

fn default_timezone() -> Tz {
    chrono_tz::America::New_York
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/calendar.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            calendar: CalendarConfig {
                api_url: env::var("GOOGLE_CALENDAR_API_URL")
                    .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
                api_key: env::var("GOOGLE_API_KEY").ok().filter(|v| !v.is_empty()),
                calendar_id: env::var("GOOGLE_CALENDAR_ID").ok().filter(|v| !v.is_empty()),
                timezone: match env::var("CALENDAR_TIMEZONE") {
                    Ok(v) => v
                        .parse::<Tz>()
                        .map_err(|_| ConfigError::InvalidValue("CALENDAR_TIMEZONE".to_string()))?,
                    Err(_) => default_timezone(),
                },
                default_day_window: env::var("CALENDAR_DAYS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .unwrap_or(8),
                max_results: env::var("CALENDAR_MAX_RESULTS")
                    .unwrap_or_else(|_| "250".to_string())
                    .parse()
                    .unwrap_or(250),
                refresh_interval_seconds: env::var("REFRESH_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600u64),
                unmatched_policy: match env::var("SCHEDULE_UNMATCHED_POLICY") {
                    Ok(v) => v.parse().map_err(|_| {
                        ConfigError::InvalidValue("SCHEDULE_UNMATCHED_POLICY".to_string())
                    })?,
                    Err(_) => UnmatchedPolicy::default(),
                },
            },
            admin: AdminConfig {
                password_hash: env::var("ADMIN_PASSWORD_HASH")
                    .map_err(|_| ConfigError::MissingEnv("ADMIN_PASSWORD_HASH".to_string()))?,
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            rate_limit: RateLimitConfig {
                public_per_second: env::var("RATE_LIMIT_PUBLIC_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                public_burst: env::var("RATE_LIMIT_PUBLIC_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
                login_per_second: env::var("RATE_LIMIT_LOGIN_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                login_burst: env::var("RATE_LIMIT_LOGIN_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/calendar.db".to_string(),
                max_connections: 5,
            },
            calendar: CalendarConfig {
                api_url: "https://www.googleapis.com/calendar/v3".to_string(),
                api_key: None,
                calendar_id: None,
                timezone: default_timezone(),
                default_day_window: 8,
                max_results: 250,
                refresh_interval_seconds: 3600,
                unmatched_policy: UnmatchedPolicy::default(),
            },
            admin: AdminConfig {
                password_hash: String::new(),
                jwt_secret: String::new(),
                jwt_expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                public_per_second: 10,
                public_burst: 50,
                login_per_second: 3,
                login_burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_calendar_settings() {
        let config = Config::default();
        assert_eq!(config.calendar.timezone, chrono_tz::America::New_York);
        assert_eq!(config.calendar.unmatched_policy, UnmatchedPolicy::SortFirst);
        assert_eq!(config.calendar.default_day_window, 8);
        assert!(config.calendar.api_key.is_none());
    }
}
