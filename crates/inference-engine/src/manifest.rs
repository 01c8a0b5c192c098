//! Model artifact manifest
//!
//! The manifest is a small JSON document shipped next to the ONNX file:
//!
//! ```json
//! {
//!   "model_path": "sleep_state_model.onnx",
//!   "classes": ["Awake", "Deep Sleep", "Light Sleep"],
//!   "feature_columns": ["ax_mean", "ax_std", "..."],
//!   "scaler": { "data_min": [0.1, 0.0, 0.8], "data_max": [0.9, 0.7, 1.1] },
//!   "probability_output": 1
//! }
//! ```

use crate::{InferenceError, SleepStage};
use feature_engine::{MinMaxScaler, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_probability_output() -> usize {
    1
}

/// Classifier artifact description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// ONNX model file, relative to the manifest
    pub model_path: PathBuf,
    /// Class labels in model output order
    pub classes: Vec<String>,
    /// Feature columns in the order the model was trained on
    pub feature_columns: Vec<String>,
    /// Pre-fit per-axis scaler
    pub scaler: MinMaxScaler,
    /// Index of the `[1, n_classes]` probability output
    #[serde(default = "default_probability_output")]
    pub probability_output: usize,
}

impl ModelManifest {
    /// Read and validate a manifest; `model_path` is resolved against the
    /// manifest's directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InferenceError::ModelLoadError(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut manifest: ModelManifest = serde_json::from_str(&raw).map_err(|e| {
            InferenceError::ModelLoadError(format!("invalid manifest {}: {}", path.display(), e))
        })?;

        if manifest.model_path.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.model_path = dir.join(&manifest.model_path);
            }
        }

        manifest.validate()?;
        debug!(
            "Loaded manifest {}: {} classes, {} features",
            path.display(),
            manifest.classes.len(),
            manifest.feature_columns.len()
        );
        Ok(manifest)
    }

    /// Check labels, feature columns and scaler parameters
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.classes.is_empty() {
            return Err(InferenceError::ModelLoadError("manifest lists no classes".to_string()));
        }
        self.stages()?;

        if self.feature_columns.is_empty() {
            return Err(InferenceError::ModelLoadError(
                "manifest lists no feature columns".to_string(),
            ));
        }
        if let Some(unknown) = self
            .feature_columns
            .iter()
            .find(|c| !FEATURE_NAMES.contains(&c.as_str()))
        {
            return Err(InferenceError::ModelLoadError(format!(
                "unknown feature column '{}'",
                unknown
            )));
        }

        self.scaler.validate()?;
        Ok(())
    }

    /// Class labels parsed into sleep stages, in model output order
    pub fn stages(&self) -> Result<Vec<SleepStage>, InferenceError> {
        self.classes.iter().map(|c| c.parse()).collect()
    }
}
