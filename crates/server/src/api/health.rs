use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub profile: String,
    pub store: &'static str,
    pub rules_enabled: usize,
}

/// Liveness only: never touches the analytical store.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "riskgate",
        version: env!("CARGO_PKG_VERSION"),
        profile: state.config.profile_label().to_string(),
        store: state.service.aggregator().backend_name(),
        rules_enabled: state.service.rule_set().enabled_count(),
    })
}
