pub mod admin;
pub mod calendar;
pub mod health;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::test_pool;
    use crate::AppState;

    pub const TEST_PASSWORD: &str = "hunter2";

    /// App state over an in-memory database, with a known admin password and
    /// no calendar credentials.
    pub async fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.admin.password_hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
        config.admin.jwt_secret = "test-secret".to_string();

        Arc::new(AppState {
            db: test_pool().await,
            config,
            http: reqwest::Client::new(),
        })
    }
}
