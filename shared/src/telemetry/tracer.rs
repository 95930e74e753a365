//! Span creation and scoped span lifetime.
//!
//! A `Tracer` opens spans as `SpanGuard`s. The guard owns its span exclusively
//! and closes it when dropped, whichever way the enclosing scope is left
//! (normal return, early return, `?` propagation or panic unwinding). Closing
//! stamps the end time and hands the finished span to the tracer's sink.

use super::sink::SpanSink;
use crate::models::{Span, SpanKind, SpanStatus};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Event recorded on a span whose guard was dropped during a panic.
pub const PANIC_EVENT: &str = "panicked";

/// Opens spans for one service and routes finished spans to a sink.
///
/// Cloning is cheap; clones share the sink.
#[derive(Clone)]
pub struct Tracer {
    service: Arc<str>,
    sink: Arc<dyn SpanSink>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer for `service` exporting to `sink`.
    #[must_use]
    pub fn new(service: impl Into<String>, sink: Arc<dyn SpanSink>) -> Self {
        Self {
            service: Arc::from(service.into()),
            sink,
        }
    }

    /// Returns the service name stamped on every span.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Opens a root span with a fresh trace id.
    #[must_use]
    pub fn start(&self, name: impl Into<String>, kind: SpanKind) -> SpanGuard {
        let span = Span::new(new_trace_id(), new_span_id(), name, &*self.service).with_kind(kind);
        SpanGuard {
            span: Some(span),
            sink: Arc::clone(&self.sink),
        }
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// An open span. Dropping the guard closes and exports the span.
///
/// # Example
///
/// ```
/// use shared::models::{SpanKind, SpanStatus};
/// use shared::telemetry::{InMemorySpanSink, Tracer};
/// use std::sync::Arc;
///
/// let sink = Arc::new(InMemorySpanSink::new());
/// let tracer = Tracer::new("course-catalog-service", sink.clone());
///
/// {
///     let mut span = tracer.start("index-span", SpanKind::Server);
///     span.add_event("Rendered Course Information Index Page");
///     span.set_status(SpanStatus::Ok);
/// }
///
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.spans()[0].status, SpanStatus::Ok);
/// ```
pub struct SpanGuard {
    // Only `None` while the guard is being dropped.
    span: Option<Span>,
    sink: Arc<dyn SpanSink>,
}

impl std::fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanGuard")
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

impl SpanGuard {
    /// Opens a span nested under this one, in the same trace.
    #[must_use]
    pub fn child(&self, name: impl Into<String>, kind: SpanKind) -> SpanGuard {
        let span = match &self.span {
            Some(parent) => Span::new(&parent.trace_id, new_span_id(), name, &parent.service)
                .with_parent(&parent.span_id),
            None => Span::new(new_trace_id(), new_span_id(), name, ""),
        }
        .with_kind(kind);

        SpanGuard {
            span: Some(span),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Sets an attribute, replacing any earlier value for the key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Some(span) = self.span.as_mut() {
            span.set_attribute(key, value);
        }
    }

    /// Appends a timestamped event.
    pub fn add_event(&mut self, text: impl Into<String>) {
        if let Some(span) = self.span.as_mut() {
            span.add_event(text);
        }
    }

    /// Sets the terminal status. The last call wins.
    pub fn set_status(&mut self, status: SpanStatus) {
        if let Some(span) = self.span.as_mut() {
            span.status = status;
        }
    }

    /// Returns the status recorded so far.
    #[must_use]
    pub fn status(&self) -> SpanStatus {
        self.span.as_ref().map_or(SpanStatus::Unset, |s| s.status)
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.span.as_ref().map_or("", |s| s.name.as_str())
    }

    /// Returns the trace id.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        self.span.as_ref().map_or("", |s| s.trace_id.as_str())
    }

    /// Returns the span id.
    #[must_use]
    pub fn span_id(&self) -> &str {
        self.span.as_ref().map_or("", |s| s.span_id.as_str())
    }

    /// Closes the span now instead of at the end of the scope.
    pub fn end(self) {}
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            if std::thread::panicking() {
                span.add_event(PANIC_EVENT);
                span.status = SpanStatus::Error;
            }
            span.end_time = Utc::now();
            self.sink.export(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::InMemorySpanSink;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn tracer() -> (Tracer, Arc<InMemorySpanSink>) {
        let sink = Arc::new(InMemorySpanSink::new());
        (Tracer::new("catalog-test", sink.clone()), sink)
    }

    #[test]
    fn test_span_closed_on_scope_exit() {
        let (tracer, sink) = tracer();

        {
            let mut span = tracer.start("index-span", SpanKind::Server);
            span.set_attribute("http.method", "GET");
            assert!(sink.is_empty());
        }

        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "index-span");
        assert_eq!(spans[0].service, "catalog-test");
        assert_eq!(spans[0].kind, SpanKind::Server);
        assert_eq!(spans[0].attribute_str("http.method"), Some("GET"));
        assert!(spans[0].end_time >= spans[0].start_time);
    }

    #[test]
    fn test_span_closed_on_early_return() {
        fn lookup(tracer: &Tracer, found: bool) -> Result<(), &'static str> {
            let mut span = tracer.start("course-details-span", SpanKind::Server);
            if !found {
                span.set_status(SpanStatus::Error);
                return Err("not found");
            }
            span.set_status(SpanStatus::Ok);
            Ok(())
        }

        let (tracer, sink) = tracer();
        assert!(lookup(&tracer, false).is_err());
        assert!(lookup(&tracer, true).is_ok());

        let spans = sink.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(spans[1].status, SpanStatus::Ok);
    }

    #[test]
    fn test_span_closed_with_error_on_panic() {
        let (tracer, sink) = tracer();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut span = tracer.start("catalog-span", SpanKind::Server);
            span.set_status(SpanStatus::Ok);
            panic!("boom");
        }));

        assert!(result.is_err());
        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert!(spans[0].has_event(PANIC_EVENT));
    }

    #[test]
    fn test_status_last_write_wins() {
        let (tracer, sink) = tracer();

        let mut span = tracer.start("add-course-span", SpanKind::Server);
        assert_eq!(span.status(), SpanStatus::Unset);
        span.set_status(SpanStatus::Error);
        span.set_status(SpanStatus::Ok);
        span.end();

        assert_eq!(sink.spans()[0].status, SpanStatus::Ok);
    }

    #[test]
    fn test_child_span_nesting() {
        let (tracer, sink) = tracer();

        let parent = tracer.start("catalog-span", SpanKind::Server);
        let parent_id = parent.span_id().to_string();
        let trace_id = parent.trace_id().to_string();
        {
            let mut child = parent.child("load-courses-span", SpanKind::Internal);
            child.add_event("Loaded Courses from JSON file");
        }
        parent.end();

        let spans = sink.spans();
        assert_eq!(spans.len(), 2);
        // Children close first.
        assert_eq!(spans[0].name, "load-courses-span");
        assert_eq!(spans[0].parent_span_id.as_deref(), Some(parent_id.as_str()));
        assert_eq!(spans[0].trace_id, trace_id);
        assert_eq!(spans[0].kind, SpanKind::Internal);
        assert!(spans[1].is_root());
    }

    #[test]
    fn test_ids_are_hex_and_distinct() {
        let (tracer, _sink) = tracer();

        let a = tracer.start("a", SpanKind::Server);
        let b = tracer.start("b", SpanKind::Server);

        assert_eq!(a.trace_id().len(), 32);
        assert_eq!(a.span_id().len(), 16);
        assert!(a.trace_id().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.trace_id(), b.trace_id());
    }
}
