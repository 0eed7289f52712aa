use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{Show, ShowRepository, UpsertShow};
use crate::error::{AppError, AppResult};
use crate::services::auth::{AuthService, ADMIN_SUBJECT};
use crate::services::refresh::{CalendarRefreshManager, RefreshOutcome};
use crate::services::settings::{CalendarSettings, SettingsService, UpdateSettings};
use crate::AppState;

/// Routes that require an admin session. The login route is served
/// separately so it can carry its own rate limit.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings", get(get_settings).post(update_settings))
        .route("/refresh", post(refresh_now))
        .route("/shows", get(list_shows))
        .route("/shows/:entry_id", put(upsert_show).delete(delete_show))
}

pub fn login_router() -> Router<Arc<AppState>> {
    Router::new().route("/login", post(login))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: CalendarSettings,
    /// Token to submit with the next settings or refresh form.
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub csrf_token: String,
    #[serde(flatten)]
    pub settings: UpdateSettings,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub csrf_token: String,
}

// ============================================================================
// Authentication
// ============================================================================

/// Extractor for an authenticated admin session.
pub struct AdminUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let claims = AuthService::decode_jwt(&state.config.admin, token)?;
        Ok(AdminUser(claims.sub))
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if !AuthService::verify_password(&state.config.admin, &request.password)? {
        tracing::warn!("Rejected admin login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let (token, expires_at) = AuthService::create_jwt(&state.config.admin, ADMIN_SUBJECT)?;
    Ok(Json(LoginResponse { token, expires_at }))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<SettingsResponse>> {
    let settings = SettingsService::load(&state.db, &state.config.calendar).await?;
    let csrf_token = AuthService::issue_csrf_token(&state.config.admin, &admin)?;

    Ok(Json(SettingsResponse {
        settings,
        csrf_token,
    }))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    AuthService::verify_csrf_token(&state.config.admin, &admin, &request.csrf_token)?;

    let settings =
        SettingsService::update(&state.db, &state.config.calendar, request.settings).await?;
    let csrf_token = AuthService::issue_csrf_token(&state.config.admin, &admin)?;

    Ok(Json(SettingsResponse {
        settings,
        csrf_token,
    }))
}

/// Run the calendar refresh now, with the stored settings.
async fn refresh_now(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshOutcome>> {
    AuthService::verify_csrf_token(&state.config.admin, &admin, &request.csrf_token)?;

    let outcome = CalendarRefreshManager::refresh(&state).await?;
    Ok(Json(outcome))
}

async fn list_shows(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<Vec<Show>>> {
    Ok(Json(ShowRepository::list_all(&state.db).await?))
}

async fn upsert_show(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(entry_id): Path<String>,
    Json(show): Json<UpsertShow>,
) -> AppResult<Json<Show>> {
    if show.calendar_id.trim().is_empty() || show.slug.trim().is_empty() {
        return Err(AppError::Validation(
            "calendar_id and slug must not be empty".to_string(),
        ));
    }

    Ok(Json(ShowRepository::upsert(&state.db, &entry_id, show).await?))
}

async fn delete_show(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(entry_id): Path<String>,
) -> AppResult<StatusCode> {
    if ShowRepository::delete(&state.db, &entry_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Show {} not found", entry_id)))
    }
}
