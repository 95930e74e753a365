//! Metric snapshot model.
//!
//! Defines the `Metric` structure a metrics registry produces when it is read
//! by an exporter. Instruments themselves live in `telemetry::metrics`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// A counter that only increases (e.g., request count).
    Counter,
    /// A histogram for measuring distributions (e.g., request latency).
    Histogram,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

/// A histogram bucket for distribution metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (inclusive).
    pub upper_bound: u64,
    /// The cumulative count of observations at or below `upper_bound`.
    pub count: u64,
}

/// Histogram data for distribution metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramData {
    /// The histogram buckets, in ascending bound order.
    pub buckets: Vec<HistogramBucket>,
    /// The sum of all observed values.
    pub sum: u64,
    /// The total count of observations.
    pub count: u64,
}

/// The value of a metric, which varies by metric type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Current total of a counter.
    Simple(u64),
    /// Histogram data for distribution metrics.
    Histogram(HistogramData),
}

impl MetricValue {
    /// Returns the simple value if this is a simple metric.
    #[must_use]
    pub fn as_simple(&self) -> Option<u64> {
        match self {
            Self::Simple(v) => Some(*v),
            Self::Histogram(_) => None,
        }
    }

    /// Returns the histogram data if this is a histogram metric.
    #[must_use]
    pub fn as_histogram(&self) -> Option<&HistogramData> {
        match self {
            Self::Simple(_) => None,
            Self::Histogram(h) => Some(h),
        }
    }
}

/// The current state of one labeled series of an instrument.
///
/// # Example
///
/// ```
/// use shared::models::Metric;
///
/// let metric = Metric::counter("page_access_counter", 3)
///     .with_label("page", "catalog")
///     .with_unit("requests");
///
/// assert_eq!(metric.value.as_simple(), Some(3));
/// assert_eq!(metric.labels["page"], "catalog");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// The instrument name (e.g., "`page_access_counter`").
    pub name: String,

    /// The type of metric.
    pub metric_type: MetricType,

    /// The metric value.
    pub value: MetricValue,

    /// Timestamp when the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Labels (dimensions) identifying the series.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Optional description of the metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional unit of the metric (e.g., "requests", "ns").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Metric {
    /// Creates a new metric with the current timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, metric_type: MetricType, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            metric_type,
            value,
            timestamp: Utc::now(),
            labels: BTreeMap::new(),
            description: None,
            unit: None,
        }
    }

    /// Creates a new counter metric.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, MetricType::Counter, MetricValue::Simple(value))
    }

    /// Creates a new histogram metric.
    #[must_use]
    pub fn histogram(name: impl Into<String>, data: HistogramData) -> Self {
        Self::new(name, MetricType::Histogram, MetricValue::Histogram(data))
    }

    /// Adds a label to the metric.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replaces all labels.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the description of the metric.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the unit of the metric.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}
