use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::db::OptionRepository;
use crate::services::store::CALENDAR_EVENTS_KEY;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    /// When the calendar view was last written, if ever.
    pub calendar_updated_at: Option<String>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, calendar_updated_at) =
        match OptionRepository::get(&state.db, CALENDAR_EVENTS_KEY).await {
            Ok(cached) => (
                StatusCode::OK,
                cached.map(|o| {
                    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(o.updated_at, chrono::Utc)
                        .to_rfc3339()
                }),
            ),
            Err(e) => {
                tracing::warn!("Health check could not read the cache: {:?}", e);
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
        };

    let response = HealthResponse {
        status: if status.is_success() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        calendar_updated_at,
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::test_state;
    use crate::services::store::{CacheStore, SqliteCacheStore};

    async fn check(state: Arc<AppState>) -> (StatusCode, serde_json::Value) {
        let app = Router::new()
            .route("/health", get(health_check))
            .with_state(state);
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn reports_last_calendar_write() {
        let state = test_state().await;

        let (status, body) = check(state.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["calendar_updated_at"].is_null());

        SqliteCacheStore::new(&state.db)
            .set(CALENDAR_EVENTS_KEY, "[]")
            .await
            .unwrap();
        let (_, body) = check(state).await;
        assert!(body["calendar_updated_at"].is_string());
    }
}
