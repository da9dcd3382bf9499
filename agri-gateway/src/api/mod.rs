//! HTTP API handlers for agri-gateway

pub mod health;
pub mod inference;

pub use health::health_routes;
pub use inference::inference_routes;
