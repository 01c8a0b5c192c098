//! Sleep Stage Inference Engine
//!
//! Loads the externally trained classifier artifact (ONNX model, min-max
//! scaler and feature column order) and maps accelerometer windows to a
//! sleep stage with per-class probabilities.

mod engine;
mod manifest;
mod stage;

pub use engine::{Classification, OnnxModel, SleepClassifier, SleepModel};
pub use manifest::ModelManifest;
pub use stage::SleepStage;

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Unknown sleep stage label: {0}")]
    UnknownLabel(String),
}

impl From<feature_engine::FeatureError> for InferenceError {
    fn from(err: feature_engine::FeatureError) -> Self {
        InferenceError::ModelLoadError(err.to_string())
    }
}
