use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;

use config::Config;
use services::init;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    /// Shared HTTP client for calendar provider requests.
    pub http: reqwest::Client,
}

/// Error handler shared by all rate limiters: JSON body in the same shape
/// as `AppError`, plus `Retry-After`.
fn rate_limited_response(error: GovernorError) -> http::Response<Body> {
    let (status, body, headers) = match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let body = serde_json::json!({
                "error": {
                    "code": "RATE_LIMITED",
                    "message": "Rate limit exceeded",
                    "details": { "retry_after_seconds": wait_time }
                }
            });
            let mut headers = headers.unwrap_or_default();
            if let Ok(value) = HeaderValue::from_str(&wait_time.to_string()) {
                headers.insert(http::header::RETRY_AFTER, value);
            }
            (StatusCode::TOO_MANY_REQUESTS, body, Some(headers))
        }
        GovernorError::UnableToExtractKey => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": {
                    "code": "INVALID_REQUEST",
                    "message": "Unable to determine client IP for rate limiting"
                }
            }),
            None,
        ),
        GovernorError::Other { code, msg, headers } => (
            StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            serde_json::json!({
                "error": {
                    "code": "RATE_LIMIT_ERROR",
                    "message": msg.unwrap_or_else(|| "Rate limiting error".to_string())
                }
            }),
            headers,
        ),
    };

    let mut resp = http::Response::new(Body::from(body.to_string()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(hmap) = headers {
        for (name, value) in hmap.iter() {
            resp.headers_mut().append(name.clone(), value.clone());
        }
    }
    resp
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "show_calendar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting show calendar service");

    let pool = init::init_db(&config).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("show-calendar/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        http: http_client,
    });

    // Shutdown notifier for the tokio worker and the limiter cleanup threads
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let thread_shutdown = Arc::new(AtomicBool::new(false));

    let refresh_handle = init::spawn_refresh_worker(app_state.clone(), shutdown_tx.clone());

    // Public read API limiter
    let public_gov_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit.public_per_second.into())
            .burst_size(config.rate_limit.public_burst)
            .key_extractor(SmartIpKeyExtractor)
            .error_handler(rate_limited_response)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build public governor config"))?,
    );

    // Admin login limiter, stricter to slow down password guessing
    let login_gov_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit.login_per_second.into())
            .burst_size(config.rate_limit.login_burst)
            .key_extractor(SmartIpKeyExtractor)
            .error_handler(rate_limited_response)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build login governor config"))?,
    );

    let public_cleaner = {
        let limiter = public_gov_conf.limiter().clone();
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || loop {
            for _ in 0..60 {
                if flag.load(Ordering::SeqCst) {
                    tracing::info!("Public rate limiter cleanup thread exiting");
                    return;
                }
                std::thread::sleep(Duration::from_secs(1));
            }
            tracing::debug!("public rate limiter size: {}", limiter.len());
            limiter.retain_recent();
        })
    };

    let login_cleaner = {
        let limiter = login_gov_conf.limiter().clone();
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || loop {
            for _ in 0..60 {
                if flag.load(Ordering::SeqCst) {
                    tracing::info!("Login rate limiter cleanup thread exiting");
                    return;
                }
                std::thread::sleep(Duration::from_secs(1));
            }
            tracing::debug!("login rate limiter size: {}", limiter.len());
            limiter.retain_recent();
        })
    };

    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Cached calendar views
        .nest(
            "/api",
            routes::calendar::router().layer(GovernorLayer {
                config: public_gov_conf.clone(),
            }),
        )
        // Admin surface
        .nest(
            "/api/admin",
            routes::admin::login_router()
                .layer(GovernorLayer {
                    config: login_gov_conf.clone(),
                })
                .merge(routes::admin::router()),
        )
        .with_state(app_state.clone())
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let shutdown_tx_clone = shutdown_tx.clone();
    let thread_shutdown_clone = thread_shutdown.clone();

    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting for Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                tracing::warn!("Failed to bind Ctrl+C: {}", e);
            }
        }

        tracing::info!("Shutdown signal received, notifying background workers and threads");
        let _ = shutdown_tx_clone.send(());
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server stopped accepting new connections");
        }
    }

    // A refresh in flight gets a bounded grace period to finish its writes.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for the refresh worker to exit",
        shutdown_wait.as_secs()
    );
    let _ = tokio::time::timeout(shutdown_wait, refresh_handle).await;

    if let Err(e) = public_cleaner.join() {
        tracing::warn!("Public limiter cleanup thread join failed: {:?}", e);
    }
    if let Err(e) = login_cleaner.join() {
        tracing::warn!("Login limiter cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
