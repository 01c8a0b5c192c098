//! Window Buffer Implementation

use crate::Sample;
use std::ops::Index;

/// Default window size (30 samples = 30 minutes at one sample per minute)
pub const DEFAULT_WINDOW_SIZE: usize = 30;

/// Completed, immutable window of samples
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    samples: Box<[Sample]>,
}

impl Window {
    /// Wrap an ordered list of samples
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// X axis values in arrival order
    pub fn x(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.x).collect()
    }

    /// Y axis values in arrival order
    pub fn y(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.y).collect()
    }

    /// Z axis values in arrival order
    pub fn z(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.z).collect()
    }

    /// Apply a per-sample transform, keeping order
    pub fn map(&self, f: impl Fn(&Sample) -> Sample) -> Self {
        Self {
            samples: self.samples.iter().map(f).collect(),
        }
    }
}

impl Index<usize> for Window {
    type Output = Sample;

    fn index(&self, index: usize) -> &Sample {
        &self.samples[index]
    }
}

/// Accumulates samples until a full window is available.
///
/// The buffer is not synchronized on its own; it lives inside the tracking
/// session and is only touched under the session lock. A completed window is
/// moved out by [`WindowBuffer::append`] in the same call that pushes the
/// N-th sample, so there is no state in which a full window is observable.
#[derive(Debug)]
pub struct WindowBuffer {
    /// In-progress samples
    pending: Vec<Sample>,
    /// Samples per window
    capacity: usize,
    /// Total samples appended (for statistics)
    total_appended: u64,
    /// Total windows handed off
    windows_emitted: u64,
}

impl WindowBuffer {
    /// Create a new buffer emitting windows of `capacity` samples
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window size must be > 0");
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
            total_appended: 0,
            windows_emitted: 0,
        }
    }

    /// Create a buffer with the default window size (30 samples)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }

    /// Append a sample; returns the completed window when this sample fills it
    pub fn append(&mut self, sample: Sample) -> Option<Window> {
        self.pending.push(sample);
        self.total_appended += 1;

        if self.pending.len() < self.capacity {
            return None;
        }

        let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        self.windows_emitted += 1;
        Some(Window::new(samples))
    }

    /// Number of samples in the in-progress window
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Samples per window
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill ratio of the in-progress window (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.pending.len() as f64 / self.capacity as f64
    }

    /// Get total samples appended (for statistics)
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// Get total windows handed off
    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    /// Discard the in-progress window
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(i: usize) -> Sample {
        Sample::new(i as f64, i as f64 * 2.0, i as f64 * 3.0)
    }

    #[test]
    fn test_emits_at_threshold() {
        let mut buffer = WindowBuffer::new(3);

        assert!(buffer.append(sample(0)).is_none());
        assert!(buffer.append(sample(1)).is_none());
        let window = buffer.append(sample(2)).expect("window should complete");

        assert_eq!(window.len(), 3);
        assert_eq!(window[0], sample(0));
        assert_eq!(window[2], sample(2));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear_discards_partial_window() {
        let mut buffer = WindowBuffer::new(4);
        buffer.append(sample(0));
        buffer.append(sample(1));

        buffer.clear();
        assert_eq!(buffer.len(), 0);

        for i in 0..3 {
            assert!(buffer.append(sample(i)).is_none());
        }
        assert!(buffer.append(sample(3)).is_some());
    }

    #[test]
    fn test_fill_ratio() {
        let mut buffer = WindowBuffer::with_default_capacity();
        assert_eq!(buffer.fill_ratio(), 0.0);

        for i in 0..15 {
            buffer.append(sample(i));
        }

        assert!((buffer.fill_ratio() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_axis_projections() {
        let window = Window::new(vec![sample(1), sample(2)]);
        assert_eq!(window.x(), vec![1.0, 2.0]);
        assert_eq!(window.y(), vec![2.0, 4.0]);
        assert_eq!(window.z(), vec![3.0, 6.0]);
    }

    proptest! {
        #[test]
        fn prop_one_window_per_capacity(capacity in 1usize..40, count in 0usize..400) {
            let mut buffer = WindowBuffer::new(capacity);
            let mut emitted = Vec::new();

            for i in 0..count {
                if let Some(window) = buffer.append(sample(i)) {
                    emitted.push(window);
                }
            }

            prop_assert_eq!(emitted.len(), count / capacity);
            prop_assert_eq!(buffer.len(), count % capacity);
            prop_assert_eq!(buffer.windows_emitted() as usize, emitted.len());

            // Concatenated windows are exactly the first k*capacity samples, in order
            let flattened: Vec<Sample> = emitted.iter().flat_map(|w| w.iter().copied()).collect();
            let expected: Vec<Sample> = (0..emitted.len() * capacity).map(sample).collect();
            prop_assert_eq!(flattened, expected);
        }
    }
}
