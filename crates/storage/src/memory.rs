//! In-memory sink

use crate::{LabeledWindow, SleepRecord, SleepWindowSink, StorageError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Sink keeping rows in memory until drained
pub struct MemorySink {
    records: Mutex<Vec<SleepRecord>>,
    /// Max rows kept before the oldest are discarded
    max_records: usize,
    /// Rows discarded by the retention limit since creation
    discarded: AtomicU64,
}

impl MemorySink {
    /// Create a new in-memory sink
    pub fn new() -> Self {
        Self::with_limit(100_000)
    }

    /// Create a sink retaining at most `max_records` rows
    pub fn with_limit(max_records: usize) -> Self {
        info!("Creating in-memory sleep window sink (limit {})", max_records);
        Self {
            records: Mutex::new(Vec::new()),
            max_records,
            discarded: AtomicU64::new(0),
        }
    }

    /// Rows lost to the retention limit so far
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepWindowSink for MemorySink {
    fn append(&self, window: &LabeledWindow) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        records.extend(window.records());

        // Enforce retention
        if records.len() > self.max_records {
            let excess = records.len() - self.max_records;
            records.drain(..excess);
            let total = self.discarded.fetch_add(excess as u64, Ordering::Relaxed) + excess as u64;
            warn!(
                "Retention limit of {} rows reached, discarded {} oldest rows ({} so far)",
                self.max_records, excess, total
            );
        }

        debug!("Stored window ending {} ({} rows pending)", window.window_end, records.len());
        Ok(())
    }

    fn drain(&self) -> Result<Vec<SleepRecord>, StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(std::mem::take(&mut *records))
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.records
            .lock()
            .map(|r| r.len())
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};
    use window_buffer::{Sample, Window};

    fn labeled(n: usize) -> LabeledWindow {
        let window = Window::new((0..n).map(|i| Sample::new(i as f64, 0.0, 0.0)).collect());
        let end = NaiveDateTime::parse_from_str("2025-05-02 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        LabeledWindow::ending_at(window, "Awake", end, Duration::minutes(1))
    }

    #[test]
    fn test_drain_empties() {
        let sink = MemorySink::new();
        sink.append(&labeled(30)).unwrap();
        assert_eq!(sink.len().unwrap(), 30);

        assert_eq!(sink.drain().unwrap().len(), 30);
        assert!(sink.is_empty().unwrap());
    }

    #[test]
    fn test_retention_limit() {
        let sink = MemorySink::with_limit(5);
        sink.append(&labeled(4)).unwrap();
        sink.append(&labeled(4)).unwrap();

        assert_eq!(sink.discarded(), 3);

        let rows = sink.drain().unwrap();
        assert_eq!(rows.len(), 5);
        // Oldest rows were discarded
        assert_eq!(rows[0].ax, 3.0);
    }

    #[test]
    fn test_nothing_discarded_under_limit() {
        let sink = MemorySink::with_limit(8);
        sink.append(&labeled(4)).unwrap();
        sink.append(&labeled(4)).unwrap();
        assert_eq!(sink.discarded(), 0);
        assert_eq!(sink.len().unwrap(), 8);
    }
}
