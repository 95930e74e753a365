//! Span sinks and exporters.
//!
//! A `SpanSink` receives each finished span from a closing `SpanGuard` and
//! must return immediately. `BatchSpanProcessor` is the production sink: it
//! queues spans on a bounded channel and a background task hands batches to a
//! `SpanExporter`. When the queue is full the span is dropped and counted, so
//! request handling never waits on export.

use crate::models::Span;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Errors an exporter can report for a batch.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The span could not be encoded.
    #[error("Failed to encode span: {0}")]
    Encode(#[from] serde_json::Error),

    /// The export destination rejected or could not receive the batch.
    #[error("Span export failed: {0}")]
    Transport(String),
}

/// Receives finished spans. Implementations must not block the caller.
pub trait SpanSink: Send + Sync {
    /// Accepts one finished span.
    fn export(&self, span: Span);
}

/// Ships batches of finished spans to their destination.
pub trait SpanExporter: Send + Sync {
    /// Exports one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be delivered. The batch is
    /// dropped either way.
    fn export(&self, batch: Vec<Span>) -> Result<(), ExportError>;
}

/// Collects spans in memory.
///
/// Serves both as a direct sink and as a batch exporter; used in tests and
/// local debugging.
#[derive(Debug, Default)]
pub struct InMemorySpanSink {
    spans: RwLock<Vec<Span>>,
}

impl InMemorySpanSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every collected span, in close order.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        self.spans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the collected spans with the given name.
    #[must_use]
    pub fn spans_named(&self, name: &str) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|s| s.name == name)
            .collect()
    }

    /// Returns the number of collected spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no span has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every collected span.
    pub fn clear(&self) {
        self.spans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SpanSink for InMemorySpanSink {
    fn export(&self, span: Span) {
        self.spans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}

impl SpanExporter for InMemorySpanSink {
    fn export(&self, batch: Vec<Span>) -> Result<(), ExportError> {
        self.spans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
        Ok(())
    }
}

/// Writes each span as a JSON-encoded `tracing` event on the `spans` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpanExporter;

impl SpanExporter for ConsoleSpanExporter {
    fn export(&self, batch: Vec<Span>) -> Result<(), ExportError> {
        for span in batch {
            let encoded = serde_json::to_string(&span)?;
            tracing::info!(
                target: "spans",
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                name = %span.name,
                status = %span.status,
                duration_us = span.duration().num_microseconds(),
                span = %encoded,
                "Span finished"
            );
        }
        Ok(())
    }
}

/// Tuning knobs for `BatchSpanProcessor`.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of spans waiting for export.
    pub queue_capacity: usize,
    /// A batch is exported as soon as it reaches this size.
    pub max_batch_size: usize,
    /// Partial batches are exported at this interval.
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 2048,
            max_batch_size: 512,
            flush_interval: Duration::from_millis(5000),
        }
    }
}

/// Non-blocking sink that batches spans for a background exporter task.
#[derive(Debug)]
pub struct BatchSpanProcessor {
    sender: mpsc::Sender<Span>,
    shutdown: watch::Sender<bool>,
    dropped: AtomicU64,
}

impl BatchSpanProcessor {
    /// Starts the export task on the current tokio runtime.
    ///
    /// Returns the sink and the handle of the export task, which finishes
    /// after `shutdown` once the queue has been drained.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(exporter: Arc<dyn SpanExporter>, config: BatchConfig) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_export_loop(receiver, shutdown_rx, exporter, config));

        let processor = Arc::new(Self {
            sender,
            shutdown,
            dropped: AtomicU64::new(0),
        });
        (processor, handle)
    }

    /// Asks the export task to flush what is queued and stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Returns how many spans were discarded because the queue was full or
    /// the export task had stopped.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SpanSink for BatchSpanProcessor {
    fn export(&self, span: Span) {
        if self.sender.try_send(span).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 1000 == 0 {
                tracing::warn!(dropped, "Span queue unavailable, dropping span");
            }
        }
    }
}

async fn run_export_loop(
    mut receiver: mpsc::Receiver<Span>,
    mut shutdown: watch::Receiver<bool>,
    exporter: Arc<dyn SpanExporter>,
    config: BatchConfig,
) {
    let max_batch_size = config.max_batch_size.max(1);
    let mut batch = Vec::with_capacity(max_batch_size);
    let mut tick = interval(config.flush_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(span) => {
                    batch.push(span);
                    if batch.len() >= max_batch_size {
                        flush(exporter.as_ref(), &mut batch);
                    }
                }
                None => break,
            },
            _ = tick.tick() => flush(exporter.as_ref(), &mut batch),
            _ = shutdown.changed() => break,
        }
    }

    receiver.close();
    while let Ok(span) = receiver.try_recv() {
        batch.push(span);
    }
    flush(exporter.as_ref(), &mut batch);
    tracing::debug!("Span export task stopped");
}

fn flush(exporter: &dyn SpanExporter, batch: &mut Vec<Span>) {
    if batch.is_empty() {
        return;
    }
    let spans = std::mem::take(batch);
    let count = spans.len();
    if let Err(e) = exporter.export(spans) {
        tracing::warn!(error = %e, count, "Failed to export span batch");
    }
}
