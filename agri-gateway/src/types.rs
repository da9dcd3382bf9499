//! Model-facing input types and the uniform prediction result
//!
//! Every value here lives for a single request: it is built by an adapter,
//! handed to a model, and dropped once the response is written.

use image::RgbImage;
use serde_json::{json, Value};

// ============================================================================
// Image input
// ============================================================================

/// Batched image tensor in `[batch, channel, height, width]` layout
///
/// Values are raw pixel intensities scaled into `[0, 1]`. No resize, crop or
/// mean/std normalization is applied; the disease classifier was trained on
/// exactly this representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl ImageTensor {
    /// Convert an RGB image into a batch of one CHW tensor
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];

        for (pixel_index, pixel) in image.as_raw().chunks_exact(3).enumerate() {
            for (channel, value) in pixel.iter().enumerate() {
                data[channel * plane + pixel_index] = f32::from(*value) / 255.0;
            }
        }

        Self {
            shape: [1, 3, height, width],
            data,
        }
    }

    /// `[batch, channels, height, width]`
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn height(&self) -> usize {
        self.shape[2]
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    /// Flat tensor data in CHW order
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

// ============================================================================
// Tabular input
// ============================================================================

/// Ordered feature vector for the crop classifier
///
/// Position is meaning: the vector is built from JSON values in insertion
/// order, not by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularFeatureVector(Vec<f64>);

impl TabularFeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Yield record
// ============================================================================

/// Storage kind of a yield record column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

/// Borrowed value of one yield record column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue<'a> {
    Text(&'a str),
    Integer(i64),
    Real(f64),
}

/// Single-row input for the yield regressor
///
/// Units are model-facing: `area` in hectares, `production` in tonnes.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRecord {
    pub crop: String,
    pub crop_year: i64,
    pub season: String,
    pub state: String,
    /// Hectares
    pub area: f64,
    /// Tonnes
    pub production: f64,
    pub annual_rainfall: f64,
    pub fertilizer: f64,
    pub pesticide: f64,
}

impl YieldRecord {
    /// Column names the regressor was fitted with, in training order
    pub const COLUMNS: [&'static str; 9] = [
        "Crop",
        "Crop_Year",
        "Season",
        "State",
        "Area",
        "Production",
        "Annual_Rainfall",
        "Fertilizer",
        "Pesticide",
    ];

    pub fn column_kind(name: &str) -> Option<ColumnKind> {
        match name {
            "Crop" | "Season" | "State" => Some(ColumnKind::Text),
            "Crop_Year" => Some(ColumnKind::Integer),
            "Area" | "Production" | "Annual_Rainfall" | "Fertilizer" | "Pesticide" => {
                Some(ColumnKind::Real)
            }
            _ => None,
        }
    }

    /// Look up a column by its exact model-facing name
    pub fn column(&self, name: &str) -> Option<ColumnValue<'_>> {
        let value = match name {
            "Crop" => ColumnValue::Text(&self.crop),
            "Crop_Year" => ColumnValue::Integer(self.crop_year),
            "Season" => ColumnValue::Text(&self.season),
            "State" => ColumnValue::Text(&self.state),
            "Area" => ColumnValue::Real(self.area),
            "Production" => ColumnValue::Real(self.production),
            "Annual_Rainfall" => ColumnValue::Real(self.annual_rainfall),
            "Fertilizer" => ColumnValue::Real(self.fertilizer),
            "Pesticide" => ColumnValue::Real(self.pesticide),
            _ => return None,
        };
        Some(value)
    }

    /// All columns in training order
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, ColumnValue<'_>)> + '_ {
        Self::COLUMNS
            .iter()
            .filter_map(move |name| self.column(name).map(|value| (*name, value)))
    }
}

// ============================================================================
// Prediction result
// ============================================================================

/// Uniform result of any of the three models
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResult {
    /// Disease label from the image classifier
    Label(String),
    /// Raw predictions from the crop classifier
    Values(Vec<f64>),
    /// Formatted two-line yield summary
    YieldSummary(String),
}

impl PredictionResult {
    /// Response body for this result
    pub fn to_json(&self) -> Value {
        match self {
            PredictionResult::Label(label) => json!({ "output": label }),
            PredictionResult::Values(values) => json!({ "output": values }),
            PredictionResult::YieldSummary(summary) => json!({ "prediction": summary }),
        }
    }
}
