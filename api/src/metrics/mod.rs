//! Metric reporting for the course catalog service.
//!
//! The registry itself lives in `shared::telemetry`; this module pushes its
//! snapshots to the diagnostic log on a fixed interval.

pub mod reporter;

pub use reporter::MetricsReporter;
