//! Health check endpoint
//!
//! Reports uptime and the load state of each model. A gateway with any
//! model missing still answers, with status "degraded".

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::models::ModelStatus;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when every model loaded, otherwise "degraded"
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub models: Vec<ModelStatus>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let status = if state.registry.all_loaded() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "agri-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        models: state.registry.statuses(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
