//! Log record model.
//!
//! Defines the fixed-shape `LogRecord` written by the structured logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::Location;

/// Log severity level.
///
/// Ordered from least to most severe so levels can be compared against a
/// minimum threshold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning conditions.
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// A single application log record.
///
/// Every record has exactly these six fields; nothing else is serialized.
///
/// # Example
///
/// ```
/// use shared::models::{LogLevel, LogRecord};
///
/// let record = LogRecord::new(LogLevel::Info, "Page Rendered: Index", "course-catalog");
/// let json = serde_json::to_value(&record).unwrap();
///
/// assert_eq!(json["level"], "INFO");
/// assert_eq!(json["logger"], "course-catalog");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was created.
    pub timestamp: DateTime<Utc>,

    /// Severity level.
    pub level: LogLevel,

    /// The log message content.
    pub message: String,

    /// Name of the logger that produced the record.
    pub logger: String,

    /// Source file of the logging call.
    pub filename: String,

    /// Source line of the logging call.
    pub line: u32,
}

impl LogRecord {
    /// Creates a record stamped with the current time and the caller's location.
    #[must_use]
    #[track_caller]
    pub fn new(level: LogLevel, message: impl Into<String>, logger: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            logger: logger.into(),
            filename: location.file().to_string(),
            line: location.line(),
        }
    }
}
