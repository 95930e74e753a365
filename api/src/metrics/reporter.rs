//! Periodic metric export.
//!
//! Snapshots the metric registry on a fixed interval and emits one `tracing`
//! event per series under the `metrics` target.

use chrono::{DateTime, Utc};
use shared::models::{Metric, MetricValue};
use shared::telemetry::MetricsRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// One collected snapshot of the registry.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    /// Every series of every instrument.
    pub metrics: Vec<Metric>,
    /// When the snapshot was taken.
    pub collected_at: DateTime<Utc>,
}

impl MetricsReport {
    /// Returns the current value of the named counter summed over its series.
    #[must_use]
    pub fn counter_total(&self, name: &str) -> u64 {
        self.metrics
            .iter()
            .filter(|m| m.name == name)
            .filter_map(|m| m.value.as_simple())
            .sum()
    }
}

/// Background exporter for the metric registry.
pub struct MetricsReporter {
    metrics: Arc<MetricsRegistry>,
    interval_duration: Duration,
}

impl MetricsReporter {
    /// Creates a new reporter.
    ///
    /// # Arguments
    ///
    /// * `metrics` - Registry to snapshot
    /// * `interval_duration` - How often to report
    #[must_use]
    pub fn new(metrics: Arc<MetricsRegistry>, interval_duration: Duration) -> Self {
        Self {
            metrics,
            interval_duration,
        }
    }

    /// Takes a snapshot of the registry.
    #[must_use]
    pub fn collect(&self) -> MetricsReport {
        MetricsReport {
            metrics: self.metrics.snapshot(),
            collected_at: Utc::now(),
        }
    }

    /// Collects a snapshot and emits it.
    pub fn report(&self) -> MetricsReport {
        let report = self.collect();
        for metric in &report.metrics {
            let labels = metric
                .labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            match &metric.value {
                MetricValue::Simple(value) => tracing::info!(
                    target: "metrics",
                    name = %metric.name,
                    %labels,
                    value,
                    "Counter reported"
                ),
                MetricValue::Histogram(data) => tracing::info!(
                    target: "metrics",
                    name = %metric.name,
                    %labels,
                    count = data.count,
                    sum = data.sum,
                    unit = metric.unit.as_deref().unwrap_or(""),
                    "Histogram reported"
                ),
            }
        }
        tracing::debug!(
            target: "metrics",
            series = report.metrics.len(),
            collected_at = %report.collected_at,
            "Metrics snapshot exported"
        );
        report
    }

    /// Starts the reporting loop.
    ///
    /// # Cancellation
    ///
    /// This function runs until cancelled via the task handle.
    pub async fn run(self: Arc<Self>) {
        let mut tick = interval(self.interval_duration);
        // The first tick completes immediately.
        tick.tick().await;

        loop {
            tick.tick().await;
            self.report();
        }
    }
}
