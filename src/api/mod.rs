//! HTTP API: axum router over the bet store, the live EV estimator and
//! results analytics. CORS is permissive by default for a local frontend.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

pub use routes::{ApiState, AppState};

/// CORS layer for the configured origin (`*` for any).
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let value = origin
            .trim()
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid CORS origin: {origin}"))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/bets", get(routes::list_bets).post(routes::create_bet))
        .route(
            "/api/bets/:id",
            get(routes::get_bet)
                .put(routes::update_bet)
                .delete(routes::delete_bet),
        )
        .route("/api/bets/:id/settle", post(routes::settle_bet))
        .route("/api/sports", get(routes::list_sports).post(routes::add_sport))
        .route(
            "/api/bet-types",
            get(routes::list_bet_types).post(routes::add_bet_type),
        )
        .route("/api/ev/estimate", post(routes::estimate))
        .route("/api/results", get(routes::results))
        .layer(cors)
        .with_state(state)
}

/// Serve `app` on `addr` until `shutdown` resolves.
pub async fn serve(
    app: Router,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr, "API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    info!("API server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
