//! Structured application logger.
//!
//! Each call serializes one `LogRecord` as a single JSON line and appends it
//! to a `LogSink`. Logging is fail-open: a record that cannot be written is
//! counted and reported on the diagnostic `tracing` stream, never returned to
//! the caller.

use crate::models::{LogLevel, LogRecord};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A durable append target accepting one serialized record at a time.
pub trait LogSink: Send + Sync {
    /// Appends one line (without trailing newline).
    ///
    /// # Errors
    ///
    /// Returns an error if the line could not be written.
    fn append(&self, line: &str) -> io::Result<()>;
}

/// Appends records to a file, one JSON object per line.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Opens (or creates) the file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{line}")?;
        file.flush()
    }
}

/// Keeps lines in memory; used in tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns every line decoded back into a record.
    ///
    /// Lines that fail to decode are skipped.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Emits fixed-shape JSON log records.
///
/// # Example
///
/// ```
/// use shared::models::LogLevel;
/// use shared::telemetry::{MemoryLogSink, StructuredLogger};
/// use std::sync::Arc;
///
/// let sink = Arc::new(MemoryLogSink::new());
/// let logger = StructuredLogger::new("course-catalog", sink.clone());
///
/// logger.info("Page Rendered: Index");
///
/// let records = sink.records();
/// assert_eq!(records[0].level, LogLevel::Info);
/// assert_eq!(records[0].message, "Page Rendered: Index");
/// ```
pub struct StructuredLogger {
    name: String,
    min_level: LogLevel,
    sink: Arc<dyn LogSink>,
    faults: AtomicU64,
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("name", &self.name)
            .field("min_level", &self.min_level)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

impl StructuredLogger {
    /// Creates a logger writing records at `INFO` and above.
    #[must_use]
    pub fn new(name: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: name.into(),
            min_level: LogLevel::Info,
            sink,
            faults: AtomicU64::new(0),
        }
    }

    /// Sets the minimum level that is written.
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Returns the logger name stamped on every record.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many records could not be written.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Writes one record. Never fails.
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if level < self.min_level {
            return;
        }
        let record = LogRecord::new(level, message, &self.name);
        mirror(&record);

        let written = serde_json::to_string(&record)
            .map_err(io::Error::from)
            .and_then(|line| self.sink.append(&line));

        if let Err(e) = written {
            let faults = self.faults.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(error = %e, faults, "Failed to write structured log record");
        }
    }

    /// Writes an `INFO` record.
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Writes a `WARNING` record.
    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    /// Writes an `ERROR` record.
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

fn mirror(record: &LogRecord) {
    let LogRecord {
        message,
        logger,
        filename,
        line,
        ..
    } = record;
    match record.level {
        LogLevel::Debug => tracing::debug!(%logger, %filename, line, "{message}"),
        LogLevel::Info => tracing::info!(%logger, %filename, line, "{message}"),
        LogLevel::Warning => tracing::warn!(%logger, %filename, line, "{message}"),
        LogLevel::Error | LogLevel::Critical => {
            tracing::error!(%logger, %filename, line, "{message}");
        }
    }
}
