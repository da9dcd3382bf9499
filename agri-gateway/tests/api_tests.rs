//! Integration tests for agri-gateway API endpoints
//!
//! Tests cover:
//! - GET /health with all models loaded and in degraded mode
//! - POST /run_model2 multipart image classification
//! - POST /run_model1 positional crop features
//! - POST /model3 yield estimation and field validation
//! - 413 for bodies over the upload limit

use agri_gateway::{
    build_router,
    labels::{DISEASE_CLASS_COUNT, DISEASE_LABELS},
    models::{
        ImageClassifier, ModelError, ModelKind, ModelLoadError, ModelRegistry, ModelSlot,
        TabularClassifier, YieldRegressor,
    },
    types::{ImageTensor, TabularFeatureVector, YieldRecord},
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "agri-test-boundary";
const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

// =============================================================================
// Stub models
// =============================================================================

/// Peaks at class `width % classes`, so the label is predictable per image
struct WidthPicksClass;

impl ImageClassifier for WidthPicksClass {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        let mut logits = vec![0.0; DISEASE_CLASS_COUNT];
        logits[image.width() % DISEASE_CLASS_COUNT] = 1.0;
        Ok(logits)
    }
}

/// Returns the features it was given
struct EchoCrop;

impl TabularClassifier for EchoCrop {
    fn predict(&self, features: &TabularFeatureVector) -> Result<Vec<f64>, ModelError> {
        Ok(features.as_slice().to_vec())
    }
}

struct ConstantYield(f64);

impl YieldRegressor for ConstantYield {
    fn predict(&self, _record: &YieldRecord) -> Result<f64, ModelError> {
        Ok(self.0)
    }
}

struct BrokenYield;

impl YieldRegressor for BrokenYield {
    fn predict(&self, _record: &YieldRecord) -> Result<f64, ModelError> {
        Err(ModelError::Inference("Unknown label 'Mars' for column State".into()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn registry_with_yield(regressor: Arc<dyn YieldRegressor>) -> ModelRegistry {
    ModelRegistry::new(
        ModelSlot::loaded(
            ModelKind::DiseaseClassifier,
            Arc::new(WidthPicksClass) as Arc<dyn ImageClassifier>,
        ),
        ModelSlot::loaded(
            ModelKind::CropClassifier,
            Arc::new(EchoCrop) as Arc<dyn TabularClassifier>,
        ),
        ModelSlot::loaded(ModelKind::YieldRegressor, regressor),
    )
}

fn setup_app() -> Router {
    let registry = registry_with_yield(Arc::new(ConstantYield(1.2)));
    build_router(AppState::new(registry), UPLOAD_LIMIT)
}

/// Crop and disease models loaded, yield regressor failed at startup
fn setup_degraded_app() -> Router {
    let registry = ModelRegistry::new(
        ModelSlot::loaded(
            ModelKind::DiseaseClassifier,
            Arc::new(WidthPicksClass) as Arc<dyn ImageClassifier>,
        ),
        ModelSlot::loaded(
            ModelKind::CropClassifier,
            Arc::new(EchoCrop) as Arc<dyn TabularClassifier>,
        ),
        ModelSlot::failed(
            ModelKind::YieldRegressor,
            ModelLoadError::NotFound(PathBuf::from("models/yield.onnx")),
        )
        .with_path("models/yield.onnx"),
    );
    build_router(AppState::new(registry), UPLOAD_LIMIT)
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart body with a single file part
fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/run_model2")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([34, 139, 34]));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn yield_body() -> Value {
    json!({
        "state": "Punjab",
        "crop": "Wheat",
        "season": "Rabi",
        "crop_year": 2024,
        "area_acres": 10,
        "production_bags": 100,
        "bag_weight": 50,
        "rainfall": 650.0,
        "fertilizer": 1200.5,
        "pesticide": 30.25
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).expect("Should parse JSON");
    (status, body)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_all_models_loaded() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(setup_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "agri-gateway");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());

    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 3);
    assert!(models.iter().all(|m| m["loaded"] == true));
    assert_eq!(models[0]["name"], "disease_classifier");
}

#[tokio::test]
async fn test_health_degraded_when_a_model_failed() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(setup_degraded_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    let yield_status = &body["models"][2];
    assert_eq!(yield_status["name"], "yield_regressor");
    assert_eq!(yield_status["loaded"], false);
    assert_eq!(yield_status["path"], "models/yield.onnx");
    assert!(yield_status["error"]
        .as_str()
        .unwrap()
        .contains("not found"));
}

// =============================================================================
// POST /run_model2
// =============================================================================

#[tokio::test]
async fn test_disease_model_returns_label() {
    let request = multipart_request("image", "leaf.png", &png_bytes(13, 4));
    let (status, body) = send(setup_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    let label = body["output"].as_str().unwrap();
    assert!(DISEASE_LABELS.contains(&label));
    assert_eq!(label, "Apple___Apple_scab");
}

#[tokio::test]
async fn test_disease_model_without_image_is_400() {
    let request = multipart_request("photo", "leaf.png", &png_bytes(2, 2));
    let (status, body) = send(setup_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No image provided" }));
}

#[tokio::test]
async fn test_disease_model_non_multipart_body_is_400() {
    let request = json_request("/run_model2", "{}");
    let (status, body) = send(setup_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No image provided" }));
}

#[tokio::test]
async fn test_disease_model_undecodable_image_is_400() {
    let request = multipart_request("image", "leaf.png", b"not really a png");
    let (status, body) = send(setup_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid image"));
}

#[tokio::test]
async fn test_disease_model_upload_over_limit_is_413() {
    let registry = registry_with_yield(Arc::new(ConstantYield(1.2)));
    let app = build_router(AppState::new(registry), 1024);

    let request = multipart_request("image", "leaf.png", &vec![0x89; 4096]);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Payload too large"));
}

// =============================================================================
// POST /run_model1
// =============================================================================

#[tokio::test]
async fn test_crop_model_uses_insertion_order() {
    let body = r#"{"nitrogen": 90, "phosphorus": 42, "potassium": 43,
        "temperature": 20.8, "humidity": 82.0, "ph": 6.5, "rainfall": 202.9}"#;
    let (status, response) = send(setup_app(), json_request("/run_model1", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response["output"],
        json!([90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9])
    );
}

#[tokio::test]
async fn test_crop_model_non_numeric_is_500() {
    let (status, body) = send(
        setup_app(),
        json_request("/run_model1", r#"{"nitrogen": "high"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("nitrogen"));
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (status, body) =
        send(setup_app(), json_request("/run_model1", "{\"nitrogen\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// =============================================================================
// POST /model3
// =============================================================================

#[tokio::test]
async fn test_json_body_over_limit_is_413() {
    let registry = registry_with_yield(Arc::new(ConstantYield(1.2)));
    let app = build_router(AppState::new(registry), 64);

    let (status, body) = send(app, json_request("/model3", &yield_body().to_string())).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_yield_model_non_object_body_is_500() {
    for body in ["[]", "null", "\"Punjab\""] {
        let (status, response) = send(setup_app(), json_request("/model3", body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body {}", body);
        assert_eq!(
            response,
            json!({ "error": "Invalid request body: expected a JSON object" })
        );
    }
}

#[tokio::test]
async fn test_yield_model_worked_example() {
    let (status, body) = send(
        setup_app(),
        json_request("/model3", &yield_body().to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["prediction"],
        "🌾 Estimated Yield: 1.20 t/ha\nEquivalent: 59.28 bags per acre"
    );
}

#[tokio::test]
async fn test_yield_model_reports_each_missing_field() {
    for field in [
        "state",
        "crop",
        "season",
        "crop_year",
        "area_acres",
        "production_bags",
        "bag_weight",
        "rainfall",
        "fertilizer",
        "pesticide",
    ] {
        let mut body = yield_body();
        body.as_object_mut().unwrap().remove(field);

        let (status, response) =
            send(setup_app(), json_request("/model3", &body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "field {}", field);
        assert_eq!(
            response,
            json!({ "error": format!("Missing field: {}", field) })
        );
    }
}

#[tokio::test]
async fn test_yield_model_inference_failure_is_500() {
    let registry = registry_with_yield(Arc::new(BrokenYield));
    let app = build_router(AppState::new(registry), UPLOAD_LIMIT);

    let (status, body) = send(app, json_request("/model3", &yield_body().to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Unknown label"));
}

#[tokio::test]
async fn test_yield_model_unavailable_is_500() {
    let (status, body) = send(
        setup_degraded_app(),
        json_request("/model3", &yield_body().to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Model 'yield_regressor' is not available"));
}

#[tokio::test]
async fn test_yield_missing_field_checked_before_model_availability() {
    let mut body = yield_body();
    body.as_object_mut().unwrap().remove("crop");

    let (status, response) =
        send(setup_degraded_app(), json_request("/model3", &body.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Missing field: crop");
}
