//! HTTP error responses
//!
//! Every failure leaves the gateway as `{"error": "<message>"}`. Client
//! mistakes are 400; everything else is 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::adapters::InferenceError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be read or parsed (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeded the configured body limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Adapter or model failure, status depends on the variant
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Error for a body the extractor refused, keeping its status class
    pub fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(message)
        } else if status.is_client_error() {
            ApiError::BadRequest(message)
        } else {
            ApiError::Internal(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(
                InferenceError::MissingInput
                | InferenceError::Decode(_)
                | InferenceError::MissingField(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", message);
        } else {
            warn!(status = status.as_u16(), "Rejected request: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
