//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let risk = Router::new()
        .route("/check", post(api::check))
        .route("/blacklist", get(api::list_blacklist))
        .route("/report", get(api::report))
        .route("/monitor/realtime", get(api::realtime_monitor))
        .route("/rules", get(api::rules))
        .route("/rules/reload", post(api::reload_rules));

    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .nest("/api/v1/risk", risk)
        .layer(CatchPanicLayer::custom(api::panic_response))
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin; anything else is taken as a single origin.
fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match origin.trim().parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
