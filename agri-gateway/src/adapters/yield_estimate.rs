//! Yield estimation from farmer-facing units
//!
//! Converts acres and bags into the hectares and tonnes the regressor was
//! trained on, runs the regressor, and reports the result in both t/ha and
//! bags per acre.

use agri_common::units::{
    acres_to_hectares, bags_to_tonnes, tonnes_per_hectare_to_bags_per_acre,
};
use serde_json::{Map, Value};
use std::fmt;

use super::InferenceError;
use crate::models::{ModelError, YieldRegressor};
use crate::types::YieldRecord;

/// Request fields in the order they are checked
pub const YIELD_FIELDS: [&str; 10] = [
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
];

/// Yield request in farmer-facing units
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRequest {
    pub state: String,
    pub crop: String,
    pub season: String,
    pub crop_year: i64,
    pub area_acres: f64,
    pub production_bags: f64,
    /// Kilograms per bag
    pub bag_weight: f64,
    pub rainfall: f64,
    pub fertilizer: f64,
    pub pesticide: f64,
}

fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<String, InferenceError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(InferenceError::InvalidField {
            field,
            expected: "a string",
        })
}

fn number_field(object: &Map<String, Value>, field: &'static str) -> Result<f64, InferenceError> {
    object.get(field).and_then(Value::as_f64).ok_or(InferenceError::InvalidField {
        field,
        expected: "a number",
    })
}

fn integer_field(object: &Map<String, Value>, field: &'static str) -> Result<i64, InferenceError> {
    let value = object.get(field);
    value
        .and_then(Value::as_i64)
        .or_else(|| {
            value
                .and_then(Value::as_f64)
                .filter(|v| v.fract() == 0.0 && v.is_finite())
                .map(|v| v as i64)
        })
        .ok_or(InferenceError::InvalidField {
            field,
            expected: "an integer",
        })
}

impl YieldRequest {
    /// Extract the request from a JSON object
    ///
    /// Presence is checked first, in [`YIELD_FIELDS`] order, so the first
    /// absent field is the one reported.
    pub fn from_json(body: &Value) -> Result<Self, InferenceError> {
        let object = body.as_object().ok_or(InferenceError::NotAnObject)?;

        if let Some(missing) = YIELD_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(InferenceError::MissingField(*missing));
        }

        Ok(Self {
            state: text_field(object, "state")?,
            crop: text_field(object, "crop")?,
            season: text_field(object, "season")?,
            crop_year: integer_field(object, "crop_year")?,
            area_acres: number_field(object, "area_acres")?,
            production_bags: number_field(object, "production_bags")?,
            bag_weight: number_field(object, "bag_weight")?,
            rainfall: number_field(object, "rainfall")?,
            fertilizer: number_field(object, "fertilizer")?,
            pesticide: number_field(object, "pesticide")?,
        })
    }

    /// Model-facing record: area in hectares, production in tonnes
    pub fn to_record(&self) -> YieldRecord {
        YieldRecord {
            crop: self.crop.clone(),
            crop_year: self.crop_year,
            season: self.season.clone(),
            state: self.state.clone(),
            area: acres_to_hectares(self.area_acres),
            production: bags_to_tonnes(self.production_bags, self.bag_weight),
            annual_rainfall: self.rainfall,
            fertilizer: self.fertilizer,
            pesticide: self.pesticide,
        }
    }
}

/// Predicted yield in both unit systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldEstimate {
    pub tonnes_per_hectare: f64,
    pub bags_per_acre: f64,
}

impl YieldEstimate {
    pub fn from_tonnes_per_hectare(
        tonnes_per_hectare: f64,
        bag_weight: f64,
    ) -> Result<Self, InferenceError> {
        if !tonnes_per_hectare.is_finite() {
            return Err(ModelError::Output(format!(
                "regressor returned a non-finite yield: {}",
                tonnes_per_hectare
            ))
            .into());
        }
        Ok(Self {
            tonnes_per_hectare,
            bags_per_acre: tonnes_per_hectare_to_bags_per_acre(tonnes_per_hectare, bag_weight)?,
        })
    }
}

impl fmt::Display for YieldEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🌾 Estimated Yield: {:.2} t/ha\nEquivalent: {:.2} bags per acre",
            self.tonnes_per_hectare, self.bags_per_acre
        )
    }
}

/// Convert, run the regressor, and convert back
pub fn estimate(
    model: &dyn YieldRegressor,
    request: &YieldRequest,
) -> Result<YieldEstimate, InferenceError> {
    let record = request.to_record();
    tracing::debug!(
        crop = %record.crop,
        state = %record.state,
        area_ha = record.area,
        production_t = record.production,
        "Running yield regressor"
    );

    let tonnes_per_hectare = model.predict(&record)?;
    YieldEstimate::from_tonnes_per_hectare(tonnes_per_hectare, request.bag_weight)
}
