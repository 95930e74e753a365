//! Data models for the course catalog service.
//!
//! This module contains the catalog entry plus the telemetry records (spans,
//! metric snapshots, log records) that the instrumentation layer produces.

pub mod course;
pub mod log;
pub mod metric;
pub mod trace;

pub use course::{Course, CourseForm, CourseValidationError, COURSE_FIELDS};
pub use log::{LogLevel, LogRecord};
pub use metric::{HistogramBucket, HistogramData, Metric, MetricType, MetricValue};
pub use trace::{Span, SpanEvent, SpanKind, SpanStatus};
