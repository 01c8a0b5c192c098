//! Feature Vector Assembly

use crate::statistics::AxisStatistics;
use crate::FeatureError;
use serde::{Deserialize, Serialize};
use tracing::trace;
use window_buffer::Window;

/// Number of features in the vector (6 per axis + 2 magnitude)
pub const FEATURE_DIMENSION: usize = 20;

/// Canonical feature order, matching the classifier's training pipeline
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSION] = [
    "ax_mean",
    "ax_std",
    "ax_min",
    "ax_max",
    "ax_median",
    "ax_range",
    "ay_mean",
    "ay_std",
    "ay_min",
    "ay_max",
    "ay_median",
    "ay_range",
    "az_mean",
    "az_std",
    "az_min",
    "az_max",
    "az_median",
    "az_range",
    "magnitude_mean",
    "magnitude_std",
];

/// Feature vector for sleep stage inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Raw feature values in [`FEATURE_NAMES`] order
    pub values: [f64; FEATURE_DIMENSION],
}

impl FeatureVector {
    /// Look up a feature by canonical name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|idx| self.values[idx])
    }

    /// Project onto an artifact's column order.
    ///
    /// The classifier was trained on a fixed column order; any reordering
    /// silently corrupts predictions, so columns are resolved by name.
    pub fn select(&self, columns: &[String]) -> Result<Vec<f32>, FeatureError> {
        columns
            .iter()
            .map(|column| {
                self.get(column)
                    .map(|v| v as f32)
                    .ok_or_else(|| FeatureError::UnknownColumn(column.clone()))
            })
            .collect()
    }
}

/// Feature extractor over fixed-size windows
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    /// Expected samples per window
    window_size: usize,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }

    /// Expected samples per window
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Extract features from a completed window.
    ///
    /// # Panics
    ///
    /// Panics if the window does not hold exactly `window_size` samples. The
    /// window buffer guarantees the size, so a mismatch is a wiring bug.
    pub fn extract(&self, window: &Window) -> FeatureVector {
        assert_eq!(
            window.len(),
            self.window_size,
            "feature extraction requires exactly {} samples",
            self.window_size
        );

        let mut values = [0.0; FEATURE_DIMENSION];
        let mut idx = 0;

        for axis in [window.x(), window.y(), window.z()] {
            let stats = AxisStatistics::compute(&axis);
            values[idx] = stats.mean; idx += 1;
            values[idx] = stats.std_dev; idx += 1;
            values[idx] = stats.min; idx += 1;
            values[idx] = stats.max; idx += 1;
            values[idx] = stats.median; idx += 1;
            values[idx] = stats.range; idx += 1;
        }

        let magnitude: Vec<f64> = window.iter().map(|s| s.magnitude()).collect();
        let magnitude_stats = AxisStatistics::compute(&magnitude);
        values[idx] = magnitude_stats.mean; idx += 1;
        values[idx] = magnitude_stats.std_dev;

        trace!("Extracted {} features from {} samples", FEATURE_DIMENSION, window.len());

        FeatureVector { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use window_buffer::Sample;

    fn ramp_window(n: usize) -> Window {
        Window::new(
            (0..n)
                .map(|i| Sample::new(i as f64 / n as f64, 0.5, 1.0 - i as f64 / n as f64))
                .collect(),
        )
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new(30);
        let features = extractor.extract(&ramp_window(30));

        assert_eq!(features.values.len(), FEATURE_DIMENSION);
        assert_eq!(features.get("ay_mean"), Some(0.5));
        assert_eq!(features.get("ay_std"), Some(0.0));
        assert_eq!(features.get("ax_min"), Some(0.0));
        assert!((features.get("ax_range").unwrap() - 29.0 / 30.0).abs() < 1e-12);
        assert!(features.get("magnitude_mean").unwrap() > 0.5);
    }

    #[test]
    fn test_select_follows_requested_order() {
        let extractor = FeatureExtractor::new(4);
        let features = extractor.extract(&ramp_window(4));

        let columns = vec!["ay_mean".to_string(), "ax_min".to_string()];
        let selected = features.select(&columns).unwrap();
        assert_eq!(selected, vec![0.5f32, 0.0f32]);
    }

    #[test]
    fn test_select_rejects_unknown_column() {
        let features = FeatureExtractor::new(2).extract(&ramp_window(2));
        let err = features.select(&["ax_skew".to_string()]).unwrap_err();
        assert_eq!(err, FeatureError::UnknownColumn("ax_skew".to_string()));
    }

    #[test]
    #[should_panic(expected = "exactly 30 samples")]
    fn test_wrong_window_size_panics() {
        FeatureExtractor::new(30).extract(&ramp_window(29));
    }

    proptest! {
        #[test]
        fn prop_extract_is_deterministic(
            raw in proptest::collection::vec((-4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0), 30)
        ) {
            let window = Window::new(raw.into_iter().map(|(x, y, z)| Sample::new(x, y, z)).collect());
            let extractor = FeatureExtractor::new(30);

            let first = extractor.extract(&window);
            let second = extractor.extract(&window.clone());
            prop_assert_eq!(first, second);
        }
    }
}
