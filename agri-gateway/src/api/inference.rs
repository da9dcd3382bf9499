//! Inference endpoints
//!
//! - `POST /run_model2`: multipart upload, field `image` → disease label
//! - `POST /run_model1`: JSON object of numeric features → crop predictions
//! - `POST /model3`: JSON yield request → formatted yield summary
//!
//! Request validation happens on the async side; model invocation runs on
//! the blocking pool.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::BytesRejection,
        Multipart, State,
    },
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    adapters::{self, yield_estimate::YieldRequest, InferenceError},
    error::{ApiError, ApiResult},
    types::PredictionResult,
    AppState,
};

/// Multipart field carrying the leaf image
pub const IMAGE_FIELD: &str = "image";

/// Run an adapter on the blocking pool
async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::from_rejection(err.status(), err.body_text())
}

fn parse_json(body: Result<Bytes, BytesRejection>) -> ApiResult<Value> {
    let body = body.map_err(|e| ApiError::from_rejection(e.status(), e.body_text()))?;
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed JSON body: {}", e)))
}

/// Pull the first `image` part out of a multipart body
///
/// A body that is not multipart at all is treated as having no image.
async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Bytes> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Not a multipart body: {}", rejection);
            return Err(InferenceError::MissingInput.into());
        }
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() == Some(IMAGE_FIELD) {
            return field.bytes().await.map_err(multipart_error);
        }
    }

    Err(InferenceError::MissingInput.into())
}

/// POST /run_model2
///
/// Classify a plant leaf image into one of the disease labels.
pub async fn run_disease_model(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let bytes = read_image_field(multipart).await?;
    let model = state
        .registry
        .disease_classifier()
        .map_err(InferenceError::from)?;

    let label =
        run_blocking(move || adapters::image::classify(model.as_ref(), &bytes)).await?;
    info!(label = %label, "Disease classification complete");

    Ok(Json(PredictionResult::Label(label).to_json()))
}

/// POST /run_model1
///
/// Feature values are taken in the order the client sent them.
pub async fn run_crop_model(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Value>> {
    let body = parse_json(body)?;
    let model = state
        .registry
        .crop_classifier()
        .map_err(InferenceError::from)?;

    let predictions =
        run_blocking(move || adapters::tabular::classify(model.as_ref(), &body)).await?;
    info!(predictions = ?predictions, "Crop classification complete");

    Ok(Json(PredictionResult::Values(predictions).to_json()))
}

/// POST /model3
///
/// Missing fields are reported before model availability is checked.
pub async fn run_yield_model(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Value>> {
    let request = YieldRequest::from_json(&parse_json(body)?)?;
    let model = state
        .registry
        .yield_regressor()
        .map_err(InferenceError::from)?;

    let estimate = run_blocking(move || {
        adapters::yield_estimate::estimate(model.as_ref(), &request)
    })
    .await?;
    info!(
        tonnes_per_hectare = estimate.tonnes_per_hectare,
        bags_per_acre = estimate.bags_per_acre,
        "Yield estimate complete"
    );

    Ok(Json(
        PredictionResult::YieldSummary(estimate.to_string()).to_json(),
    ))
}

/// Build inference routes
pub fn inference_routes() -> Router<AppState> {
    Router::new()
        .route("/run_model2", post(run_disease_model))
        .route("/run_model1", post(run_crop_model))
        .route("/model3", post(run_yield_model))
}
