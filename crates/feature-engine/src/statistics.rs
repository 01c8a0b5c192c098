//! Statistical Features Computation

/// Statistical features for one signal of a window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisStatistics {
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator)
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Median value
    pub median: f64,
    /// Max minus min
    pub range: f64,
}

impl AxisStatistics {
    /// Compute statistical features from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;

        // Mean
        let mean = values.iter().sum::<f64>() / n;

        // Min/Max
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        // Sample variance, matching the trained pipeline (ddof = 1)
        let std_dev = if values.len() >= 2 {
            let m2: f64 = values.iter().map(|&v| (v - mean) * (v - mean)).sum();
            (m2 / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            mean,
            std_dev,
            min,
            max,
            median: median(values),
            range: max - min,
        }
    }
}

/// Median; mean of the two middle values for even lengths
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_computation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = AxisStatistics::compute(&values);
        assert!((stats.mean - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let stats = AxisStatistics::compute(&values);
        // Population std is 2.0; sample std is sqrt(32 / 7)
        assert!((stats.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(AxisStatistics::compute(&[3.0, 1.0, 2.0]).median, 2.0);
        assert_eq!(AxisStatistics::compute(&[4.0, 1.0, 3.0, 2.0]).median, 2.5);
    }

    #[test]
    fn test_range() {
        let stats = AxisStatistics::compute(&[0.5, -1.5, 2.0]);
        assert_eq!(stats.min, -1.5);
        assert_eq!(stats.max, 2.0);
        assert_eq!(stats.range, 3.5);
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        let stats = AxisStatistics::compute(&[0.7]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.range, 0.0);
        assert_eq!(stats.median, 0.7);
    }

    #[test]
    fn test_empty_values() {
        let values: Vec<f64> = vec![];
        let stats = AxisStatistics::compute(&values);
        assert_eq!(stats.mean, 0.0);
    }
}
