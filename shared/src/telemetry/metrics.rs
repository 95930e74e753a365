//! Process-wide metric instruments.
//!
//! Counters and histograms keep one series of atomics per label set. Creating
//! a new series takes the write lock once; every later update only takes the
//! read lock and performs atomic adds, so concurrent increments are never
//! lost. The registry only holds current values; exporters read them through
//! `snapshot`.

use crate::models::{HistogramBucket, HistogramData, Metric};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

type LabelSet = BTreeMap<String, String>;

/// Latency bucket upper bounds in nanoseconds (10µs to 1s).
pub const LATENCY_BOUNDS_NS: [u64; 15] = [
    10_000,
    50_000,
    100_000,
    250_000,
    500_000,
    1_000_000,
    2_500_000,
    5_000_000,
    10_000_000,
    25_000_000,
    50_000_000,
    100_000_000,
    250_000_000,
    500_000_000,
    1_000_000_000,
];

fn label_set(labels: &[(&str, &str)]) -> LabelSet {
    labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// A monotonic counter.
#[derive(Debug)]
pub struct Counter {
    name: String,
    description: String,
    unit: String,
    series: RwLock<BTreeMap<LabelSet, AtomicU64>>,
}

impl Counter {
    /// Creates a counter with no recorded series.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            series: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the instrument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `delta` to the series identified by `labels`.
    pub fn add(&self, delta: u64, labels: &[(&str, &str)]) {
        let key = label_set(labels);
        {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = series.get(&key) {
                value.fetch_add(delta, Ordering::Relaxed);
                return;
            }
        }
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        series
            .entry(key)
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Returns the current value of one series (0 if never incremented).
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&label_set(labels))
            .map_or(0, |v| v.load(Ordering::Relaxed))
    }

    /// Returns the sum over every series.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|v| v.load(Ordering::Relaxed))
            .sum()
    }

    /// Returns one `Metric` per series.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Metric> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(labels, value)| {
                Metric::counter(&self.name, value.load(Ordering::Relaxed))
                    .with_labels(labels.clone())
                    .with_description(&self.description)
                    .with_unit(&self.unit)
            })
            .collect()
    }
}

#[derive(Debug)]
struct HistogramSeries {
    // Per-bucket (non-cumulative) counts; samples above the last bound are
    // only reflected in `count` and `sum`.
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum: AtomicU64,
}

impl HistogramSeries {
    fn new(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
        }
    }

    fn record(&self, bounds: &[u64], value: u64) {
        let index = bounds.partition_point(|bound| *bound < value);
        if let Some(bucket) = self.buckets.get(index) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
    }

    fn data(&self, bounds: &[u64]) -> HistogramData {
        let mut cumulative = 0;
        let buckets = bounds
            .iter()
            .zip(&self.buckets)
            .map(|(bound, count)| {
                cumulative += count.load(Ordering::Relaxed);
                HistogramBucket {
                    upper_bound: *bound,
                    count: cumulative,
                }
            })
            .collect();

        HistogramData {
            buckets,
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

/// A distribution of observed values with fixed bucket bounds.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    description: String,
    unit: String,
    bounds: Vec<u64>,
    series: RwLock<BTreeMap<LabelSet, HistogramSeries>>,
}

impl Histogram {
    /// Creates a histogram with the given ascending bucket bounds.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        bounds: &[u64],
    ) -> Self {
        let mut bounds = bounds.to_vec();
        bounds.sort_unstable();
        bounds.dedup();
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            bounds,
            series: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the instrument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records one observation in the series identified by `labels`.
    pub fn record(&self, value: u64, labels: &[(&str, &str)]) {
        let key = label_set(labels);
        {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(s) = series.get(&key) {
                s.record(&self.bounds, value);
                return;
            }
        }
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        series
            .entry(key)
            .or_insert_with(|| HistogramSeries::new(self.bounds.len()))
            .record(&self.bounds, value);
    }

    /// Returns the current data of one series, if it has any observation.
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<HistogramData> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&label_set(labels))
            .map(|s| s.data(&self.bounds))
    }

    /// Returns the number of observations over every series.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|s| s.count.load(Ordering::Relaxed))
            .sum()
    }

    /// Returns one `Metric` per series.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Metric> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(labels, s)| {
                Metric::histogram(&self.name, s.data(&self.bounds))
                    .with_labels(labels.clone())
                    .with_description(&self.description)
                    .with_unit(&self.unit)
            })
            .collect()
    }
}

/// The service's fixed set of instruments.
///
/// # Example
///
/// ```
/// use shared::telemetry::MetricsRegistry;
///
/// let metrics = MetricsRegistry::new();
/// metrics.page_access_counter.add(1, &[("page", "index")]);
/// metrics.page_access_counter.add(1, &[("page", "catalog")]);
///
/// assert_eq!(metrics.page_access_counter.total(), 2);
/// assert_eq!(metrics.page_access_counter.get(&[("page", "index")]), 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    /// Number of new courses added.
    pub new_course_counter: Counter,
    /// Number of operations that took a failure path.
    pub error_counter: Counter,
    /// Number of operations served, labeled by page.
    pub page_access_counter: Counter,
    /// Operation latency in nanoseconds, labeled by page.
    pub timing_histogram: Histogram,
}

impl MetricsRegistry {
    /// Creates the registry with every instrument at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            new_course_counter: Counter::new(
                "new_course_counter",
                "Number of new courses added",
                "requests",
            ),
            error_counter: Counter::new("error_counter", "Number of errors", "requests"),
            page_access_counter: Counter::new(
                "page_access_counter",
                "Number of page accesses",
                "requests",
            ),
            timing_histogram: Histogram::new(
                "timing_histogram",
                "Request timing histogram",
                "ns",
                &LATENCY_BOUNDS_NS,
            ),
        }
    }

    /// Returns the current value of every series of every instrument.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics = self.new_course_counter.snapshot();
        metrics.extend(self.error_counter.snapshot());
        metrics.extend(self.page_access_counter.snapshot());
        metrics.extend(self.timing_histogram.snapshot());
        metrics
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
