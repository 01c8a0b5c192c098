//! Inference Engine Implementation

use crate::manifest::ModelManifest;
use crate::{InferenceError, SleepStage};
use feature_engine::{FeatureExtractor, MinMaxScaler};
use std::collections::BTreeMap;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info};
use window_buffer::Window;

/// Scoring backend behind the classifier pipeline
pub trait SleepModel: Send + Sync {
    /// Class probabilities for one feature row, in manifest class order
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// ONNX model executed with tract
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    input_len: usize,
    probability_output: usize,
}

impl OnnxModel {
    /// Load and optimize an ONNX model taking a `[1, input_len]` f32 input
    pub fn load(
        path: impl AsRef<Path>,
        input_len: usize,
        probability_output: usize,
    ) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        info!("Loading ONNX model: {}", path.display());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, input_len]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                InferenceError::ModelLoadError(format!("{}: {}", path.display(), e))
            })?;

        Ok(Self {
            plan,
            input_len,
            probability_output,
        })
    }
}

impl SleepModel for OnnxModel {
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.input_len {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("[1, {}]", self.input_len),
                actual: format!("[1, {}]", features.len()),
            });
        }

        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let probabilities = outputs.get(self.probability_output).ok_or_else(|| {
            InferenceError::InferenceFailed(format!(
                "model has {} outputs, probability output index is {}",
                outputs.len(),
                self.probability_output
            ))
        })?;

        let view = probabilities
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        Ok(view.iter().copied().collect())
    }
}

/// Result of classifying one window
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Most probable sleep stage
    pub stage: SleepStage,
    /// Probability for each class
    pub probabilities: BTreeMap<SleepStage, f64>,
    /// Inference latency in milliseconds
    pub latency_ms: u64,
}

impl Classification {
    /// Probability of the predicted stage
    pub fn confidence(&self) -> f64 {
        self.probabilities.get(&self.stage).copied().unwrap_or(0.0)
    }
}

/// Complete classifier: scaling, feature extraction, column ordering and model
pub struct SleepClassifier {
    scaler: MinMaxScaler,
    extractor: FeatureExtractor,
    feature_columns: Vec<String>,
    stages: Vec<SleepStage>,
    model: Box<dyn SleepModel>,
}

impl SleepClassifier {
    /// Load the artifact described by a manifest file.
    ///
    /// Any failure here means the process has no usable classifier and must
    /// not start serving.
    pub fn load(manifest_path: impl AsRef<Path>, window_size: usize) -> Result<Self, InferenceError> {
        let manifest = ModelManifest::load(manifest_path)?;
        let model = OnnxModel::load(
            &manifest.model_path,
            manifest.feature_columns.len(),
            manifest.probability_output,
        )?;
        let classifier = Self::from_parts(manifest, Box::new(model), window_size)?;
        info!(
            "Sleep classifier ready: classes={:?}, window_size={}",
            classifier.stages, window_size
        );
        Ok(classifier)
    }

    /// Assemble a classifier from a manifest and an already loaded model
    pub fn from_parts(
        manifest: ModelManifest,
        model: Box<dyn SleepModel>,
        window_size: usize,
    ) -> Result<Self, InferenceError> {
        manifest.validate()?;
        Ok(Self {
            stages: manifest.stages()?,
            scaler: manifest.scaler,
            extractor: FeatureExtractor::new(window_size),
            feature_columns: manifest.feature_columns,
            model,
        })
    }

    /// Samples per window this classifier expects
    pub fn window_size(&self) -> usize {
        self.extractor.window_size()
    }

    /// Classify one completed window
    pub fn classify(&self, window: &Window) -> Result<Classification, InferenceError> {
        let start = std::time::Instant::now();

        let scaled = self.scaler.transform_window(window);
        let features = self.extractor.extract(&scaled);
        let row = features
            .select(&self.feature_columns)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let raw = self.model.predict_proba(&row)?;
        if raw.len() != self.stages.len() {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{} class probabilities", self.stages.len()),
                actual: format!("{} values", raw.len()),
            });
        }
        if raw.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::InferenceFailed(
                "model produced non-finite probabilities".to_string(),
            ));
        }

        let probabilities: BTreeMap<SleepStage, f64> = self
            .stages
            .iter()
            .copied()
            .zip(raw.iter().map(|&p| p as f64))
            .collect();

        let stage = self
            .stages
            .iter()
            .zip(raw.iter())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(stage, _)| *stage)
            .ok_or_else(|| InferenceError::InferenceFailed("no classes".to_string()))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!("Classified window as {} in {}ms", stage, latency_ms);

        Ok(Classification {
            stage,
            probabilities,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::FEATURE_NAMES;
    use window_buffer::Sample;

    /// Scores "Light Sleep" high when mean x movement is low
    struct ThresholdModel;

    impl SleepModel for ThresholdModel {
        fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
            // features[0] is ax_mean in the test manifest
            if features[0] < 0.5 {
                Ok(vec![0.1, 0.8, 0.1])
            } else {
                Ok(vec![0.7, 0.2, 0.1])
            }
        }
    }

    struct WrongArityModel;

    impl SleepModel for WrongArityModel {
        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![1.0])
        }
    }

    fn manifest() -> ModelManifest {
        ModelManifest {
            model_path: "unused.onnx".into(),
            classes: vec!["Deep Sleep".into(), "Light Sleep".into(), "Awake".into()],
            feature_columns: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler: MinMaxScaler::new([0.0; 3], [2.0; 3]).unwrap(),
            probability_output: 1,
        }
    }

    fn window(x: f64) -> Window {
        Window::new((0..30).map(|_| Sample::new(x, 0.2, 0.9)).collect())
    }

    #[test]
    fn test_classify_light_sleep() {
        let classifier = SleepClassifier::from_parts(manifest(), Box::new(ThresholdModel), 30).unwrap();

        // x = 0.4 scales to 0.2
        let result = classifier.classify(&window(0.4)).unwrap();
        assert_eq!(result.stage, SleepStage::LightSleep);
        assert!((result.confidence() - 0.8).abs() < 1e-6);
        assert_eq!(result.probabilities.len(), 3);
    }

    #[test]
    fn test_classify_uses_scaled_values() {
        let classifier = SleepClassifier::from_parts(manifest(), Box::new(ThresholdModel), 30).unwrap();

        // x = 1.2 scales to 0.6
        let result = classifier.classify(&window(1.2)).unwrap();
        assert_eq!(result.stage, SleepStage::DeepSleep);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = SleepClassifier::from_parts(manifest(), Box::new(ThresholdModel), 30).unwrap();
        let first = classifier.classify(&window(0.3)).unwrap();
        let second = classifier.classify(&window(0.3)).unwrap();
        assert_eq!(first.stage, second.stage);
        assert_eq!(first.probabilities, second.probabilities);
    }

    #[test]
    fn test_probability_count_mismatch() {
        let classifier = SleepClassifier::from_parts(manifest(), Box::new(WrongArityModel), 30).unwrap();
        assert!(matches!(
            classifier.classify(&window(0.3)),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_missing_onnx_file_is_load_error() {
        let err = OnnxModel::load("/nonexistent/model.onnx", 20, 1).err().unwrap();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));
    }
}
