//! Request instrumentation primitives.
//!
//! - [`tracer`] - span creation with scoped (RAII) lifetime
//! - [`sink`] - span sinks, the batching processor and exporters
//! - [`metrics`] - process-wide counters and the latency histogram
//! - [`logger`] - fixed-shape JSON application log
//!
//! [`Telemetry`] bundles one of each. It is built once at startup and shared
//! by reference; nothing in this module keeps global state.

pub mod logger;
pub mod metrics;
pub mod sink;
pub mod tracer;

pub use logger::{FileLogSink, LogSink, MemoryLogSink, StructuredLogger};
pub use metrics::{Counter, Histogram, MetricsRegistry, LATENCY_BOUNDS_NS};
pub use sink::{
    BatchConfig, BatchSpanProcessor, ConsoleSpanExporter, ExportError, InMemorySpanSink,
    SpanExporter, SpanSink,
};
pub use tracer::{SpanGuard, Tracer, PANIC_EVENT};

use std::sync::Arc;

/// Process-scoped instrumentation context.
#[derive(Debug, Clone)]
pub struct Telemetry {
    /// Opens request spans.
    pub tracer: Tracer,
    /// Counters and histogram.
    pub metrics: Arc<MetricsRegistry>,
    /// Application log.
    pub logger: Arc<StructuredLogger>,
}

impl Telemetry {
    /// Bundles the three instrumentation components.
    #[must_use]
    pub fn new(tracer: Tracer, metrics: Arc<MetricsRegistry>, logger: Arc<StructuredLogger>) -> Self {
        Self {
            tracer,
            metrics,
            logger,
        }
    }

    /// Builds a context whose spans and log records stay in memory.
    ///
    /// Returns the context together with the span and log sinks so callers
    /// can inspect what was recorded.
    #[must_use]
    pub fn in_memory(service: &str) -> (Self, Arc<InMemorySpanSink>, Arc<MemoryLogSink>) {
        let spans = Arc::new(InMemorySpanSink::new());
        let logs = Arc::new(MemoryLogSink::new());
        let telemetry = Self::new(
            Tracer::new(service, spans.clone()),
            Arc::new(MetricsRegistry::new()),
            Arc::new(StructuredLogger::new(service, logs.clone())),
        );
        (telemetry, spans, logs)
    }
}
