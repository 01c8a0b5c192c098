//! Storage Layer
//!
//! Append-only store of classified sleep windows. Everything appended since
//! the last drain is returned by [`SleepWindowSink::drain`] and removed.

mod csv_sink;
mod memory;
mod record;

pub use csv_sink::CsvFileSink;
pub use memory::MemorySink;
pub use record::{to_json, LabeledWindow, SleepRecord, RECORD_TIME_FORMAT};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Append-only sink of labeled windows
pub trait SleepWindowSink: Send + Sync {
    /// Append every row of a labeled window
    fn append(&self, window: &LabeledWindow) -> Result<(), StorageError>;

    /// Return all rows since the previous drain and truncate the store
    fn drain(&self) -> Result<Vec<SleepRecord>, StorageError>;

    /// Number of rows waiting for the next drain
    fn len(&self) -> Result<usize, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}
