use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, monitoring};
use crate::middleware::{api_key, tracking};
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Monitoring ──────────────────────────────────────────
        .route("/monitoring/get-requests", get(monitoring::get_requests))
        .route(
            "/monitoring/requests/:request_id",
            get(monitoring::get_request),
        )
        .route("/monitoring/metrics", get(monitoring::get_metrics))
        .route(
            "/monitoring/metrics/stream",
            get(monitoring::metrics_stream),
        )
        .route("/monitoring/summary", get(monitoring::get_summary))
        // ── Health ──────────────────────────────────────────────
        .route("/health", get(health::health))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            api_key::api_key_middleware,
        ))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            tracking::tracking_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
