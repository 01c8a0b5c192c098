//! Pre-fit Min-Max Scaling
//!
//! Reproduces the per-axis min-max scaler fitted alongside the classifier.
//! The parameters are part of the model artifact; nothing here learns from
//! live data.

use crate::FeatureError;
use serde::{Deserialize, Serialize};
use window_buffer::{Sample, Window};

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Per-axis min-max scaler with fixed, pre-fit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Minimum seen during fitting, per axis (x, y, z)
    pub data_min: [f64; 3],
    /// Maximum seen during fitting, per axis (x, y, z)
    pub data_max: [f64; 3],
    /// Output range (default [0, 1])
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

impl MinMaxScaler {
    /// Create a scaler with the default [0, 1] output range
    pub fn new(data_min: [f64; 3], data_max: [f64; 3]) -> Result<Self, FeatureError> {
        let scaler = Self {
            data_min,
            data_max,
            feature_range: default_feature_range(),
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Identity-like scaler for already normalized data
    pub fn identity() -> Self {
        Self {
            data_min: [0.0; 3],
            data_max: [1.0; 3],
            feature_range: default_feature_range(),
        }
    }

    /// Check that the parameters describe a usable transform
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.data_min.iter().chain(self.data_max.iter()).any(|v| !v.is_finite()) {
            return Err(FeatureError::InvalidScaler("non-finite bound".to_string()));
        }
        for axis in 0..3 {
            if self.data_max[axis] < self.data_min[axis] {
                return Err(FeatureError::InvalidScaler(format!(
                    "axis {} has max {} < min {}",
                    axis, self.data_max[axis], self.data_min[axis]
                )));
            }
        }
        let (lo, hi) = self.feature_range;
        if !(lo < hi) {
            return Err(FeatureError::InvalidScaler(format!(
                "feature range ({}, {}) is empty",
                lo, hi
            )));
        }
        Ok(())
    }

    fn scale_axis(&self, axis: usize, value: f64) -> f64 {
        let (lo, hi) = self.feature_range;
        let width = self.data_max[axis] - self.data_min[axis];
        // Constant axis during fitting: scikit-learn treats the scale as 1
        let scale = if width == 0.0 { 1.0 } else { (hi - lo) / width };
        (value - self.data_min[axis]) * scale + lo
    }

    /// Scale one sample
    pub fn transform(&self, sample: &Sample) -> Sample {
        Sample::new(
            self.scale_axis(0, sample.x),
            self.scale_axis(1, sample.y),
            self.scale_axis(2, sample.z),
        )
    }

    /// Scale every sample of a window, keeping order
    pub fn transform_window(&self, window: &Window) -> Window {
        window.map(|s| self.transform(s))
    }
}
