//! Course Catalog Shared Library
//!
//! This crate contains the data models, the course record store and the
//! request instrumentation primitives used by the course catalog service and
//! its CLI.
//!
//! # Modules
//!
//! - [`models`] - Courses, spans, metric snapshots and log records
//! - [`storage`] - The course store trait and its JSON file implementation
//! - [`telemetry`] - Tracer, metrics registry, structured logger, span sinks
//!
//! # Example
//!
//! ```
//! use shared::models::{SpanKind, SpanStatus};
//! use shared::telemetry::Telemetry;
//!
//! let (telemetry, spans, logs) = Telemetry::in_memory("course-catalog-service");
//!
//! {
//!     let mut span = telemetry.tracer.start("index-span", SpanKind::Server);
//!     span.set_status(SpanStatus::Ok);
//! }
//! telemetry.metrics.page_access_counter.add(1, &[("page", "index")]);
//! telemetry.logger.info("Page Rendered: Index");
//!
//! assert_eq!(spans.len(), 1);
//! assert_eq!(logs.records().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod models;
pub mod storage;
pub mod telemetry;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
