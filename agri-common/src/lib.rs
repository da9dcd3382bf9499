//! # Agri Common Library
//!
//! Shared code for the agricultural inference gateway:
//! - Error types
//! - Bootstrap configuration loading (CLI / environment / TOML / defaults)
//! - Unit conversions between farmer-facing and model-facing units

pub mod config;
pub mod error;
pub mod units;

pub use error::{Error, Result};
