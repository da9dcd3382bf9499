//! Adapters between the HTTP contract and each model's native shapes
//!
//! Adapters are synchronous and CPU-bound. Handlers run them on the
//! blocking thread pool.

pub mod image;
pub mod tabular;
pub mod yield_estimate;

use agri_common::units::UnitError;
use thiserror::Error;

use crate::models::ModelError;

/// Adapter failures, mapped to HTTP status codes by the router
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Required upload part absent
    #[error("No image provided")]
    MissingInput,

    /// Upload is not a decodable image
    #[error("Invalid image: {0}")]
    Decode(String),

    /// Request body is valid JSON but not an object
    #[error("Invalid request body: expected a JSON object")]
    NotAnObject,

    /// Required JSON field absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// JSON field present with the wrong type
    #[error("Invalid field '{field}': expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Units(#[from] UnitError),
}
