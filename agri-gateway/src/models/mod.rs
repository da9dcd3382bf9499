//! Model handles and the registry that owns them
//!
//! Each of the three models sits behind a small trait so adapters never see
//! the execution backend. Implementations must be safe for concurrent
//! read-only `predict` calls: handles are shared across requests.

pub mod onnx;
pub mod registry;

pub use registry::{ModelRegistry, ModelSlot, ModelStatus};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ImageTensor, TabularFeatureVector, YieldRecord};

/// The three models the gateway serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DiseaseClassifier,
    CropClassifier,
    YieldRegressor,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::DiseaseClassifier => "disease_classifier",
            ModelKind::CropClassifier => "crop_classifier",
            ModelKind::YieldRegressor => "yield_regressor",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure to load a model artifact at startup
#[derive(Debug, Clone, Error)]
pub enum ModelLoadError {
    /// Artifact file does not exist
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Artifact exists but cannot be parsed or prepared for execution
    #[error("model file {} is incompatible: {reason}", .path.display())]
    Incompatible { path: PathBuf, reason: String },

    /// Graph uses operators the runtime does not implement
    #[error(
        "model file {} uses operators the ONNX runtime cannot execute: {}",
        .path.display(),
        .operators.join(", ")
    )]
    UnsupportedOperators {
        path: PathBuf,
        operators: Vec<String>,
    },

    /// Classifier output width disagrees with the compiled label table
    #[error("classifier produces {actual} classes but the label table has {expected}")]
    LabelMismatch { expected: usize, actual: usize },
}

/// Failure while invoking a model
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The model failed to load at startup
    #[error("Model '{model}' is not available: {reason}")]
    Unavailable { model: ModelKind, reason: String },

    /// Input does not fit the model's expected shape or type
    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    /// The execution backend reported an error
    #[error("Model inference failed: {0}")]
    Inference(String),

    /// The model returned something the adapter cannot interpret
    #[error("Unexpected model output: {0}")]
    Output(String),
}

/// Plant disease classifier
///
/// Returns one logit per class, in label table order.
pub trait ImageClassifier: Send + Sync {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>, ModelError>;

    /// Fixed `(height, width)` the classifier accepts, if it has one
    fn input_size(&self) -> Option<(usize, usize)> {
        None
    }
}

/// Crop recommendation classifier
///
/// Returns the raw prediction values for a single feature vector.
pub trait TabularClassifier: Send + Sync {
    fn predict(&self, features: &TabularFeatureVector) -> Result<Vec<f64>, ModelError>;
}

/// Yield regressor
///
/// Returns predicted yield in tonnes per hectare.
pub trait YieldRegressor: Send + Sync {
    fn predict(&self, record: &YieldRecord) -> Result<f64, ModelError>;
}
