//! Persisted record layout

use crate::StorageError;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use window_buffer::Window;

/// Timestamp format of persisted rows
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

mod timestamp {
    use super::RECORD_TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(RECORD_TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, RECORD_TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// One persisted sample row. Field order is the column order of the store
/// and of the JSON published on drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub sleep_state: String,
    #[serde(with = "timestamp")]
    pub window_start: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub window_end: NaiveDateTime,
}

/// A classified window ready to be persisted
#[derive(Debug, Clone)]
pub struct LabeledWindow {
    pub window: Window,
    pub label: String,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
}

impl LabeledWindow {
    /// Label a window that completed at `completed_at`; the window is taken
    /// to span one `sample_period` per sample ending at completion
    pub fn ending_at(
        window: Window,
        label: impl Into<String>,
        completed_at: NaiveDateTime,
        sample_period: Duration,
    ) -> Self {
        let span = sample_period * window.len() as i32;
        Self {
            window_start: completed_at - span,
            window_end: completed_at,
            label: label.into(),
            window,
        }
    }

    /// Flatten into one row per sample
    pub fn records(&self) -> Vec<SleepRecord> {
        let n = self.window.len().max(1) as i32;
        let step = (self.window_end - self.window_start) / n;

        self.window
            .iter()
            .enumerate()
            .map(|(i, sample)| SleepRecord {
                ax: sample.x,
                ay: sample.y,
                az: sample.z,
                timestamp: self.window_start + step * i as i32,
                sleep_state: self.label.clone(),
                window_start: self.window_start,
                window_end: self.window_end,
            })
            .collect()
    }
}

/// Encode drained rows as the JSON array published on `sleepdata/`
pub fn to_json(records: &[SleepRecord]) -> Result<String, StorageError> {
    serde_json::to_string(records).map_err(|e| StorageError::SerializationError(e.to_string()))
}
