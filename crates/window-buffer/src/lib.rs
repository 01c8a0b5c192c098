//! Window Buffer
//!
//! Accumulates accelerometer samples into fixed-size windows for sleep stage
//! classification.

mod buffer;

pub use buffer::{Window, WindowBuffer, DEFAULT_WINDOW_SIZE};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors when building samples from untrusted input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("{axis} value {value} is not a finite number")]
    NonFinite { axis: &'static str, value: f64 },
}

/// Single accelerometer reading (one per minute of tracking)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    /// Create a sample without validation
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a sample, rejecting NaN and infinite axis values
    pub fn checked(x: f64, y: f64, z: f64) -> Result<Self, SampleError> {
        for (axis, value) in [("x", x), ("y", y), ("z", z)] {
            if !value.is_finite() {
                return Err(SampleError::NonFinite { axis, value });
            }
        }
        Ok(Self { x, y, z })
    }

    /// Euclidean norm of the acceleration vector
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_rejects_nan() {
        assert!(Sample::checked(0.1, f64::NAN, 0.3).is_err());
        assert!(Sample::checked(f64::INFINITY, 0.0, 0.0).is_err());
        assert!(Sample::checked(0.1, 0.2, 0.3).is_ok());
    }

    #[test]
    fn test_magnitude() {
        let sample = Sample::new(3.0, 4.0, 0.0);
        assert!((sample.magnitude() - 5.0).abs() < 1e-12);
    }
}
