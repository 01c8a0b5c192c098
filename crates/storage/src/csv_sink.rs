//! Flat CSV file sink

use crate::{LabeledWindow, SleepRecord, SleepWindowSink, StorageError};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Appends labeled windows to a CSV file; drain reads the file back and
/// truncates it
pub struct CsvFileSink {
    path: PathBuf,
    /// Serializes file access between append and drain
    guard: Mutex<()>,
}

impl CsvFileSink {
    /// Create a sink writing to `path` (parent directories are created)
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        info!("Creating CSV sleep window sink at {}", path.display());
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.guard
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Read every well-formed row. A row that does not parse (for example
    /// one left torn by a crash mid-append) is logged and skipped so it
    /// cannot block later drains; I/O failures still propagate.
    fn read_all(&self) -> Result<Vec<SleepRecord>, StorageError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<SleepRecord>() {
            match row {
                Ok(record) => records.push(record),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!(
                        "Skipping malformed row at line {} of {}: {}",
                        line,
                        self.path.display(),
                        e
                    );
                }
            }
        }
        Ok(records)
    }

    /// Whether the last byte of a non-empty file is a line break
    fn ends_with_newline(&self, len: u64) -> Result<bool, StorageError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(len - 1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    fn file_len(&self) -> Result<Option<u64>, StorageError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SleepWindowSink for CsvFileSink {
    fn append(&self, window: &LabeledWindow) -> Result<(), StorageError> {
        let _guard = self.lock()?;

        // Header only when starting a fresh (or freshly truncated) file
        let len = self.file_len()?.unwrap_or(0);
        let needs_header = len == 0;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Close off a torn last row so it does not swallow our first one
        if len > 0 && !self.ends_with_newline(len)? {
            warn!("{} ends mid-row, starting a new line", self.path.display());
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for record in window.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!(
            "Saved window {} to {} with state {}",
            window.window_start, window.window_end, window.label
        );
        Ok(())
    }

    fn drain(&self) -> Result<Vec<SleepRecord>, StorageError> {
        let _guard = self.lock()?;

        match self.file_len()? {
            None => {
                warn!("{} does not exist", self.path.display());
                return Ok(Vec::new());
            }
            Some(0) => return Ok(Vec::new()),
            Some(_) => {}
        }

        let records = self.read_all()?;
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        debug!("Drained {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn len(&self) -> Result<usize, StorageError> {
        let _guard = self.lock()?;
        match self.file_len()? {
            None | Some(0) => Ok(0),
            Some(_) => Ok(self.read_all()?.len()),
        }
    }
}
