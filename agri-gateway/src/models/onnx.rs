//! ONNX execution backend (tract)
//!
//! All three models are exported to ONNX and executed with `tract-onnx`,
//! a pure Rust runtime. Plans are optimized once at load time; running a
//! plan only borrows it, so one plan serves concurrent requests.
//!
//! Export expectations:
//! - disease classifier: one `f32` input `[1, 3, H, W]`, logits output
//!   `[1, classes]`
//! - crop classifier: one `f32` input `[1, features]`; the first output
//!   holds the predicted labels (export without ZipMap)
//! - yield regressor: one `[1, 1]` input per record column, named exactly
//!   like the column (`Crop`, `Crop_Year`, ...); the first output holds
//!   tonnes per hectare
//!
//! Operator coverage: tract runs the standard `ai.onnx` operator set but
//! only `CategoryMapper` and `TreeEnsembleClassifier` from `ai.onnx.ml`.
//! Tabular pipelines must therefore encode text columns with
//! `CategoryMapper` and express the estimator in standard operators
//! (`MatMul`/`Gemm` for linear models; tree ensembles compiled to tensor
//! operators, e.g. Hummingbird's GEMM strategy). `TreeEnsembleRegressor`,
//! `OneHotEncoder`, `LinearRegressor` and `Scaler` graphs are refused at
//! load time with [`ModelLoadError::UnsupportedOperators`].

use std::path::Path;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::ops::unimpl::UnimplementedOp;
use tracing::debug;

use super::{
    ImageClassifier, ModelError, ModelLoadError, TabularClassifier, YieldRegressor,
};
use crate::types::{ColumnKind, ColumnValue, ImageTensor, TabularFeatureVector, YieldRecord};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn incompatible(path: &Path, err: impl std::fmt::Display) -> ModelLoadError {
    ModelLoadError::Incompatible {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn inference_error(err: TractError) -> ModelError {
    ModelError::Inference(format!("{:#}", err))
}

fn output_error(err: TractError) -> ModelError {
    ModelError::Output(format!("{:#}", err))
}

/// Operator types tract parsed but cannot execute
fn unsupported_operators(model: &InferenceModel) -> Vec<String> {
    let mut operators: Vec<String> = model
        .nodes()
        .iter()
        .filter(|node| node.op_is::<UnimplementedOp>())
        .map(|node| {
            let name = node.op().name();
            name.strip_prefix("Unimplemented(")
                .and_then(|n| n.strip_suffix(')'))
                .unwrap_or(&*name)
                .to_string()
        })
        .collect();
    operators.sort();
    operators.dedup();
    operators
}

/// Parse an ONNX file into an inference model
fn read_model(path: &Path) -> Result<InferenceModel, ModelLoadError> {
    if !path.is_file() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .map_err(|e| incompatible(path, format!("{:#}", e)))?;

    let operators = unsupported_operators(&model);
    if !operators.is_empty() {
        return Err(ModelLoadError::UnsupportedOperators {
            path: path.to_path_buf(),
            operators,
        });
    }
    Ok(model)
}

/// Optimize and freeze a model whose input facts are fully set
fn into_plan(path: &Path, model: InferenceModel) -> Result<Plan, ModelLoadError> {
    model
        .into_optimized()
        .and_then(|typed| typed.into_runnable())
        .map_err(|e| incompatible(path, format!("{:#}", e)))
}

/// First output of a run as `f64` values
fn first_output_as_f64(outputs: &TVec<TValue>) -> Result<Vec<f64>, ModelError> {
    let first = outputs
        .first()
        .ok_or_else(|| ModelError::Output("model produced no outputs".to_string()))?;
    let values = first.cast_to::<f64>().map_err(output_error)?;
    let slice = values.as_slice::<f64>().map_err(output_error)?;
    Ok(slice.to_vec())
}

// ============================================================================
// Disease classifier
// ============================================================================

/// CNN disease classifier over fixed-size RGB tensors
pub struct OnnxImageClassifier {
    plan: Plan,
    height: usize,
    width: usize,
}

impl OnnxImageClassifier {
    /// Load and verify the classifier against the label table size
    pub fn load(
        path: &Path,
        height: usize,
        width: usize,
        class_count: usize,
    ) -> Result<Self, ModelLoadError> {
        let model = read_model(path)?
            .with_input_fact(0, f32::fact([1, 3, height, width]).into())
            .map_err(|e| incompatible(path, format!("{:#}", e)))?;
        let plan = into_plan(path, model)?;

        let output_classes = plan
            .model()
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().and_then(|s| s.last().copied()));
        match output_classes {
            Some(actual) if actual != class_count => {
                return Err(ModelLoadError::LabelMismatch {
                    expected: class_count,
                    actual,
                });
            }
            Some(_) => {}
            None => debug!(
                path = %path.display(),
                "Classifier output width unknown until run; checked per request"
            ),
        }

        Ok(Self {
            plan,
            height,
            width,
        })
    }
}

impl ImageClassifier for OnnxImageClassifier {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        if image.height() != self.height || image.width() != self.width {
            return Err(ModelError::InvalidInput(format!(
                "image is {}x{} but the classifier expects {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }

        let [batch, channels, height, width] = image.shape();
        let input: Tensor = tract_ndarray::Array4::from_shape_vec(
            (batch, channels, height, width),
            image.data().to_vec(),
        )
        .map_err(|e| ModelError::InvalidInput(e.to_string()))?
        .into();

        let outputs = self.plan.run(tvec!(input.into())).map_err(inference_error)?;
        let logits = outputs
            .first()
            .ok_or_else(|| ModelError::Output("model produced no outputs".to_string()))?
            .to_array_view::<f32>()
            .map_err(output_error)?;

        Ok(logits.iter().copied().collect())
    }

    fn input_size(&self) -> Option<(usize, usize)> {
        Some((self.height, self.width))
    }
}

// ============================================================================
// Crop classifier
// ============================================================================

/// Tabular crop classifier over a fixed-length feature row
pub struct OnnxTabularClassifier {
    plan: Plan,
    feature_count: usize,
}

impl OnnxTabularClassifier {
    pub fn load(path: &Path, feature_count: usize) -> Result<Self, ModelLoadError> {
        let model = read_model(path)?
            .with_input_fact(0, f32::fact([1, feature_count]).into())
            .map_err(|e| incompatible(path, format!("{:#}", e)))?;
        let plan = into_plan(path, model)?;

        Ok(Self {
            plan,
            feature_count,
        })
    }
}

impl TabularClassifier for OnnxTabularClassifier {
    fn predict(&self, features: &TabularFeatureVector) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.feature_count {
            return Err(ModelError::InvalidInput(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }

        let row: Vec<f32> = features.as_slice().iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?
            .into();

        let outputs = self.plan.run(tvec!(input.into())).map_err(inference_error)?;
        first_output_as_f64(&outputs)
    }
}

// ============================================================================
// Yield regressor
// ============================================================================

/// Regressor fed one named `[1, 1]` tensor per record column
pub struct OnnxYieldRegressor {
    plan: Plan,
    /// Model input order: column name and tensor type
    inputs: Vec<(String, DatumType)>,
}

impl OnnxYieldRegressor {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let mut model = read_model(path)?;

        let outlets = model
            .input_outlets()
            .map_err(|e| incompatible(path, format!("{:#}", e)))?
            .to_vec();

        let mut inputs = Vec::with_capacity(outlets.len());
        for (ix, outlet) in outlets.iter().enumerate() {
            let name = model.node(outlet.node).name.clone();
            let kind = YieldRecord::column_kind(&name).ok_or_else(|| {
                incompatible(
                    path,
                    format!(
                        "input '{}' is not one of the record columns {:?}",
                        name,
                        YieldRecord::COLUMNS
                    ),
                )
            })?;

            let declared = model
                .input_fact(ix)
                .map_err(|e| incompatible(path, format!("{:#}", e)))?
                .datum_type();
            let datum_type = match kind {
                ColumnKind::Text => DatumType::String,
                ColumnKind::Integer | ColumnKind::Real => declared.unwrap_or(DatumType::F32),
            };

            model
                .set_input_fact(ix, TypedFact::dt_shape(datum_type, [1usize, 1]).into())
                .map_err(|e| incompatible(path, format!("{:#}", e)))?;
            inputs.push((name, datum_type));
        }

        let plan = into_plan(path, model)?;
        Ok(Self { plan, inputs })
    }

    fn column_tensor(value: ColumnValue<'_>, datum_type: DatumType) -> TractResult<Tensor> {
        let tensor = match value {
            ColumnValue::Text(text) => Tensor::from(tract_ndarray::arr2(&[[text.to_string()]])),
            ColumnValue::Integer(v) => Tensor::from(tract_ndarray::arr2(&[[v]])),
            ColumnValue::Real(v) => Tensor::from(tract_ndarray::arr2(&[[v]])),
        };
        Ok(tensor.cast_to_dt(datum_type)?.into_owned())
    }
}

impl YieldRegressor for OnnxYieldRegressor {
    fn predict(&self, record: &YieldRecord) -> Result<f64, ModelError> {
        let mut tensors: TVec<TValue> = TVec::with_capacity(self.inputs.len());
        for (name, datum_type) in &self.inputs {
            let value = record
                .column(name)
                .ok_or_else(|| ModelError::InvalidInput(format!("no record column '{}'", name)))?;
            let tensor = Self::column_tensor(value, *datum_type).map_err(|e| {
                ModelError::InvalidInput(format!("column '{}': {:#}", name, e))
            })?;
            tensors.push(tensor.into());
        }

        let outputs = self.plan.run(tensors).map_err(inference_error)?;
        first_output_as_f64(&outputs)?
            .first()
            .copied()
            .ok_or_else(|| ModelError::Output("regressor returned an empty tensor".to_string()))
    }
}
