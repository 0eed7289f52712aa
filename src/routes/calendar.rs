use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::AppResult;
use crate::services::store::{CacheStore, SqliteCacheStore, CALENDAR_EVENTS_KEY, UPCOMING_SHOWS_KEY};
use crate::AppState;

/// Body served before the first successful refresh: the JSON string `"none"`.
const NOT_CACHED: &str = "\"none\"";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/calendar", get(get_calendar))
        .route("/upcoming", get(get_upcoming))
}

/// Day-grouped calendar, exactly as last cached.
async fn get_calendar(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    cached_view(&state, CALENDAR_EVENTS_KEY).await
}

/// Upcoming shows, exactly as last cached.
async fn get_upcoming(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    cached_view(&state, UPCOMING_SHOWS_KEY).await
}

async fn cached_view(state: &Arc<AppState>, key: &str) -> AppResult<Response> {
    let body = SqliteCacheStore::new(&state.db)
        .get(key)
        .await?
        .unwrap_or_else(|| NOT_CACHED.to_string());

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::test_state;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_none_before_first_refresh() {
        let state = test_state().await;
        let app = router().with_state(state);

        let (status, body) = get_body(app.clone(), "/calendar").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "\"none\"");

        let (_, body) = get_body(app, "/upcoming").await;
        assert_eq!(body, "\"none\"");
    }

    #[tokio::test]
    async fn serves_cached_json_verbatim() {
        let state = test_state().await;
        let stored = r#"[{"date_label":"Mon Jun 3","events":[]}]"#;
        SqliteCacheStore::new(&state.db)
            .set(CALENDAR_EVENTS_KEY, stored)
            .await
            .unwrap();
        let app = router().with_state(state);

        let (status, body) = get_body(app, "/calendar").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, stored);
    }
}
