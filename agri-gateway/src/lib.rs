//! agri-gateway library - multi-model agricultural inference gateway
//!
//! Serves a plant disease classifier, a crop recommendation classifier and
//! a crop yield regressor over HTTP. Models are loaded once at startup into
//! a [`models::ModelRegistry`] that is shared read-only by every request.

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod adapters;
pub mod api;
pub mod error;
pub mod labels;
pub mod models;
pub mod types;

pub use error::{ApiError, ApiResult};

use models::ModelRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    /// Server startup time, for uptime in `/health`
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Request bodies larger than `max_upload_bytes` are rejected with 413.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api::inference_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
