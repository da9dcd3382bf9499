//! Load-once model registry
//!
//! The registry is built once at startup and shared read-only through the
//! application state. A model that fails to load does not stop the gateway:
//! its slot records the failure and every request that needs it receives
//! [`ModelError::Unavailable`].

use agri_common::config::ModelsConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use super::onnx::{OnnxImageClassifier, OnnxTabularClassifier, OnnxYieldRegressor};
use super::{
    ImageClassifier, ModelError, ModelKind, ModelLoadError, TabularClassifier, YieldRegressor,
};
use crate::labels::DISEASE_CLASS_COUNT;

/// One model position in the registry: a shared handle or the load failure
pub struct ModelSlot<M: ?Sized> {
    kind: ModelKind,
    path: Option<PathBuf>,
    handle: Result<Arc<M>, ModelLoadError>,
}

/// Load state of one model, reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<M: ?Sized> ModelSlot<M> {
    /// Slot holding an already constructed model
    pub fn loaded(kind: ModelKind, model: Arc<M>) -> Self {
        Self {
            kind,
            path: None,
            handle: Ok(model),
        }
    }

    /// Slot recording a load failure
    pub fn failed(kind: ModelKind, error: ModelLoadError) -> Self {
        Self {
            kind,
            path: None,
            handle: Err(error),
        }
    }

    /// Record the artifact path the slot was loaded from
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build a slot from a load attempt, logging the outcome
    fn from_load(kind: ModelKind, path: &Path, result: Result<Arc<M>, ModelLoadError>) -> Self {
        match &result {
            Ok(_) => info!(model = %kind, path = %path.display(), "✓ Model loaded"),
            Err(e) => error!(
                model = %kind,
                path = %path.display(),
                error = %e,
                "Model failed to load; dependent route will return errors"
            ),
        }
        Self {
            kind,
            path: Some(path.to_path_buf()),
            handle: result,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_ok()
    }

    /// Shared handle, or `Unavailable` carrying the load failure
    pub fn handle(&self) -> Result<Arc<M>, ModelError> {
        match &self.handle {
            Ok(model) => Ok(Arc::clone(model)),
            Err(e) => Err(ModelError::Unavailable {
                model: self.kind,
                reason: e.to_string(),
            }),
        }
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            name: self.kind.name().to_string(),
            path: self.path.as_ref().map(|p| p.display().to_string()),
            loaded: self.handle.is_ok(),
            error: self.handle.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// The three model slots, constructed once and shared read-only
pub struct ModelRegistry {
    disease: ModelSlot<dyn ImageClassifier>,
    crop: ModelSlot<dyn TabularClassifier>,
    yield_regressor: ModelSlot<dyn YieldRegressor>,
}

impl ModelRegistry {
    /// Assemble a registry from prepared slots
    pub fn new(
        disease: ModelSlot<dyn ImageClassifier>,
        crop: ModelSlot<dyn TabularClassifier>,
        yield_regressor: ModelSlot<dyn YieldRegressor>,
    ) -> Self {
        Self {
            disease,
            crop,
            yield_regressor,
        }
    }

    /// Load all three ONNX artifacts described by `config`
    ///
    /// Never fails. Each artifact is loaded exactly once; failures are
    /// logged and kept in the corresponding slot.
    pub fn load(config: &ModelsConfig) -> Self {
        let disease_path = config.disease_classifier_path();
        let disease = OnnxImageClassifier::load(
            &disease_path,
            config.image_height,
            config.image_width,
            DISEASE_CLASS_COUNT,
        )
        .map(|m| Arc::new(m) as Arc<dyn ImageClassifier>);

        let crop_path = config.crop_classifier_path();
        let crop = OnnxTabularClassifier::load(&crop_path, config.crop_feature_count)
            .map(|m| Arc::new(m) as Arc<dyn TabularClassifier>);

        let yield_path = config.yield_regressor_path();
        let yield_regressor =
            OnnxYieldRegressor::load(&yield_path).map(|m| Arc::new(m) as Arc<dyn YieldRegressor>);

        let registry = Self {
            disease: ModelSlot::from_load(ModelKind::DiseaseClassifier, &disease_path, disease),
            crop: ModelSlot::from_load(ModelKind::CropClassifier, &crop_path, crop),
            yield_regressor: ModelSlot::from_load(
                ModelKind::YieldRegressor,
                &yield_path,
                yield_regressor,
            ),
        };

        info!(
            "Model registry ready: {}/3 models loaded",
            registry.loaded_count()
        );
        registry
    }

    pub fn disease_classifier(&self) -> Result<Arc<dyn ImageClassifier>, ModelError> {
        self.disease.handle()
    }

    pub fn crop_classifier(&self) -> Result<Arc<dyn TabularClassifier>, ModelError> {
        self.crop.handle()
    }

    pub fn yield_regressor(&self) -> Result<Arc<dyn YieldRegressor>, ModelError> {
        self.yield_regressor.handle()
    }

    pub fn loaded_count(&self) -> usize {
        [
            self.disease.is_loaded(),
            self.crop.is_loaded(),
            self.yield_regressor.is_loaded(),
        ]
        .iter()
        .filter(|loaded| **loaded)
        .count()
    }

    pub fn all_loaded(&self) -> bool {
        self.loaded_count() == 3
    }

    pub fn statuses(&self) -> Vec<ModelStatus> {
        vec![
            self.disease.status(),
            self.crop.status(),
            self.yield_regressor.status(),
        ]
    }
}
