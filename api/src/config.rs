//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{anyhow, Context, Result};
use shared::storage::WriteDiscipline;
use shared::telemetry::BatchConfig;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Output format of the diagnostic `tracing` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'pretty' or 'json')")),
        }
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables (a `.env` file
/// is honored by the binary):
/// - `CATALOG_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `CATALOG_PORT`: The port to listen on (default: 8080)
/// - `CATALOG_DATA_FILE`: Course catalog document (default: "`course_catalog.json`")
/// - `CATALOG_LOG_FILE`: Structured application log (default: "application.log")
/// - `CATALOG_SERVICE_NAME`: Service name stamped on spans (default: "course-catalog-service")
/// - `CATALOG_LOGGER_NAME`: Logger name stamped on log records (default: "course-catalog")
/// - `CATALOG_METRICS_INTERVAL_MS`: Metric reporting interval (default: 5000)
/// - `CATALOG_SPAN_QUEUE_CAPACITY`: Spans buffered before dropping (default: 2048)
/// - `CATALOG_SPAN_BATCH_SIZE`: Spans per export batch (default: 512)
/// - `CATALOG_SPAN_FLUSH_MS`: Partial batch flush interval (default: 5000)
/// - `CATALOG_STORE_WRITES`: "serialized" or "unserialized" (default: "serialized")
/// - `CATALOG_LOG_FORMAT`: "pretty" or "json" (default: "pretty")
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Path of the course catalog document.
    pub data_file: PathBuf,
    /// Path of the structured application log.
    pub log_file: PathBuf,
    /// Service name stamped on spans.
    pub service_name: String,
    /// Logger name stamped on log records.
    pub logger_name: String,
    /// How often the metric snapshot is reported.
    pub metrics_interval: Duration,
    /// Span export batching.
    pub span_batch: BatchConfig,
    /// Coordination of concurrent course writes.
    pub store_writes: WriteDiscipline,
    /// Diagnostic log output format.
    pub log_format: LogFormat,
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    std::env::var(name)
        .ok()
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow!("Invalid value for {name} ('{raw}'): {e}"))
        })
        .transpose()
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any numeric or enumerated variable is set but
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("CATALOG_HOST").unwrap_or(defaults.host);
        let port = parse_var("CATALOG_PORT")?.unwrap_or(defaults.port);
        let data_file = std::env::var("CATALOG_DATA_FILE").map_or(defaults.data_file, PathBuf::from);
        let log_file = std::env::var("CATALOG_LOG_FILE").map_or(defaults.log_file, PathBuf::from);
        let service_name = std::env::var("CATALOG_SERVICE_NAME").unwrap_or(defaults.service_name);
        let logger_name = std::env::var("CATALOG_LOGGER_NAME").unwrap_or(defaults.logger_name);

        let metrics_interval = parse_var("CATALOG_METRICS_INTERVAL_MS")?
            .map_or(defaults.metrics_interval, Duration::from_millis);

        let span_batch = BatchConfig {
            queue_capacity: parse_var("CATALOG_SPAN_QUEUE_CAPACITY")?
                .unwrap_or(defaults.span_batch.queue_capacity),
            max_batch_size: parse_var("CATALOG_SPAN_BATCH_SIZE")?
                .unwrap_or(defaults.span_batch.max_batch_size),
            flush_interval: parse_var("CATALOG_SPAN_FLUSH_MS")?
                .map_or(defaults.span_batch.flush_interval, Duration::from_millis),
        };

        let store_writes = parse_var("CATALOG_STORE_WRITES")?.unwrap_or(defaults.store_writes);
        let log_format = parse_var("CATALOG_LOG_FORMAT")?.unwrap_or(defaults.log_format);

        Ok(Self {
            host,
            port,
            data_file,
            log_file,
            service_name,
            logger_name,
            metrics_interval,
            span_batch,
            store_writes,
            log_format,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port combination is not a valid
    /// socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_file: PathBuf::from("course_catalog.json"),
            log_file: PathBuf::from("application.log"),
            service_name: "course-catalog-service".to_string(),
            logger_name: "course-catalog".to_string(),
            metrics_interval: Duration::from_millis(5000),
            span_batch: BatchConfig::default(),
            store_writes: WriteDiscipline::Serialized,
            log_format: LogFormat::Pretty,
        }
    }
}
