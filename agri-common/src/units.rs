//! Unit conversions between farmer-facing and model-facing units
//!
//! Farmers report land in acres and harvest in bags of a known weight.
//! The yield regressor was trained on hectares, tonnes and tonnes per hectare.
//! All conversions are plain rational scalings.

use thiserror::Error;

/// Acres per hectare, as used by the regressor's training pipeline
pub const ACRES_PER_HECTARE: f64 = 2.47;

/// Kilograms per tonne
pub const KG_PER_TONNE: f64 = 1000.0;

/// Unit conversion errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// Bag weight must be a positive, finite number of kilograms
    #[error("bag_weight must be a positive number of kilograms, got {0}")]
    InvalidBagWeight(f64),
}

/// Convert acres to hectares
pub fn acres_to_hectares(acres: f64) -> f64 {
    acres / ACRES_PER_HECTARE
}

/// Convert hectares to acres (inverse of [`acres_to_hectares`])
pub fn hectares_to_acres(hectares: f64) -> f64 {
    hectares * ACRES_PER_HECTARE
}

/// Total harvest in tonnes for `bags` bags of `bag_weight_kg` kilograms each
///
/// # Examples
///
/// ```
/// use agri_common::units::bags_to_tonnes;
///
/// assert_eq!(bags_to_tonnes(100.0, 50.0), 5.0);
/// ```
pub fn bags_to_tonnes(bags: f64, bag_weight_kg: f64) -> f64 {
    bags * bag_weight_kg / KG_PER_TONNE
}

/// Convert a yield in tonnes per hectare to bags per acre
///
/// Rejects zero, negative and non-finite bag weights since the result
/// would be infinite or meaningless.
pub fn tonnes_per_hectare_to_bags_per_acre(
    tonnes_per_hectare: f64,
    bag_weight_kg: f64,
) -> Result<f64, UnitError> {
    if !bag_weight_kg.is_finite() || bag_weight_kg <= 0.0 {
        return Err(UnitError::InvalidBagWeight(bag_weight_kg));
    }
    Ok(tonnes_per_hectare * ACRES_PER_HECTARE * KG_PER_TONNE / bag_weight_kg)
}
