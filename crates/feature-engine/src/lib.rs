//! Feature Engineering Engine
//!
//! Provides per-axis statistical feature extraction over accelerometer
//! windows, plus the pre-fit min-max scaling applied before extraction.

mod features;
mod normalizer;
mod statistics;

pub use features::{FeatureExtractor, FeatureVector, FEATURE_DIMENSION, FEATURE_NAMES};
pub use normalizer::MinMaxScaler;
pub use statistics::AxisStatistics;

use thiserror::Error;

/// Errors during feature handling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Unknown feature column: {0}")]
    UnknownColumn(String),
    #[error("Invalid scaler parameters: {0}")]
    InvalidScaler(String),
}
