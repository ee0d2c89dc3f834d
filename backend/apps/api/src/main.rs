//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use auth::{PgUserRepository, RateLimiter, auth_router, users_router};
use axum::extract::Request;
use axum::http::{self, Method, header};
use axum::{Json, Router, routing::get};
use kernel::error::app_error::AppError;
use platform::client::{UNKNOWN_CLIENT, client_ip};
use platform::rate_limit::SlidingWindowEngine;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "accounts_api=info,auth=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        token_ttl = ?config.auth.token.ttl(),
        trust_proxy_headers = config.trust_proxy_headers,
        "Configuration loaded"
    );

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // One engine for every router so quotas are shared
    let engine = Arc::new(SlidingWindowEngine::new());
    let limiter = RateLimiter::new(engine.clone(), config.rate_limits)
        .with_trusted_proxy_headers(config.trust_proxy_headers);
    spawn_rate_limit_pruning(engine, config.rate_limits.max_window());

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    let started = Instant::now();
    let trust_proxy_headers = config.trust_proxy_headers;
    let repo = PgUserRepository::new(pool);

    // Build router
    let app = Router::new()
        .route("/health", get(move || health(started)))
        .route("/api", get(root))
        .nest(
            "/api/auth",
            auth_router(repo.clone(), config.auth.clone(), limiter.clone()),
        )
        .nest("/api/users", users_router(repo, config.auth, limiter))
        .fallback(|| async { AppError::not_found("Route not found") })
        .layer(TraceLayer::new_for_http().make_span_with(move |req: &Request| {
            request_span(req, trust_proxy_headers)
        }))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn health(started: Instant) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
        "uptime_secs": started.elapsed().as_secs(),
    }))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Accounts API is running" }))
}

/// Span for every request; guard and use-case logs inherit these fields
fn request_span(req: &Request, trust_proxy_headers: bool) -> tracing::Span {
    let ip = client_ip(req, trust_proxy_headers)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        ip = %ip,
    )
}

/// Drop idle rate-limit buckets once per window
fn spawn_rate_limit_pruning(engine: Arc<SlidingWindowEngine>, window: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            let removed = engine.prune(window);
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = engine.tracked_keys(),
                    "Pruned rate limit buckets"
                );
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
