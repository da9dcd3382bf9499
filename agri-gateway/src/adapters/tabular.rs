//! Crop classification from an arbitrary JSON feature object
//!
//! The feature vector is the object's values in insertion order. Key names
//! are ignored, so clients must send fields in training order
//! (nitrogen, phosphorus, potassium, temperature, humidity, ph, rainfall).
//! There is no pre-validation: shape problems surface from the model.

use serde_json::Value;

use super::InferenceError;
use crate::models::{ModelError, TabularClassifier};
use crate::types::TabularFeatureVector;

/// Build the positional feature vector from a JSON body
pub fn feature_vector(body: &Value) -> Result<TabularFeatureVector, ModelError> {
    let object = body.as_object().ok_or_else(|| {
        ModelError::InvalidInput("expected a JSON object of numeric features".to_string())
    })?;

    let values = object
        .iter()
        .map(|(key, value)| {
            value.as_f64().ok_or_else(|| {
                ModelError::InvalidInput(format!("feature '{}' is not a number: {}", key, value))
            })
        })
        .collect::<Result<Vec<f64>, ModelError>>()?;

    Ok(TabularFeatureVector::new(values))
}

/// Run the crop classifier on a JSON body
pub fn classify(model: &dyn TabularClassifier, body: &Value) -> Result<Vec<f64>, InferenceError> {
    let features = feature_vector(body)?;
    tracing::debug!(features = ?features.as_slice(), "Running crop classifier");
    Ok(model.predict(&features)?)
}
