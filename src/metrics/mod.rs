//! Counters for the indexing pipeline and the search-engine client.
//!
//! All counters are shared atomics, so clones of [`Metrics`] observe the same
//! values.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector shared across the reconciler, services and HTTP client.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    http_requests_total: Arc<AtomicU64>,
    http_errors_total: Arc<AtomicU64>,
    http_duration_total_ms: Arc<AtomicU64>,

    /// Documents written to the search engine and marked indexed
    entries_indexed_total: Arc<AtomicU64>,

    /// Tombstones propagated as deletes
    tombstones_total: Arc<AtomicU64>,

    /// Optimistic races lost (either the engine write or the queue mark)
    version_conflicts_total: Arc<AtomicU64>,

    transient_failures_total: Arc<AtomicU64>,
    malformed_skipped_total: Arc<AtomicU64>,
    passes_total: Arc<AtomicU64>,
    searches_total: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an HTTP request with duration.
    pub fn record_http_request(&self, duration: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
        self.http_duration_total_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_http_error(&self) {
        self.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indexed(&self) {
        self.entries_indexed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tombstone(&self) {
        self.tombstones_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_version_conflict(&self) {
        self.version_conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_requests_total(&self) -> u64 {
        self.http_requests_total.load(Ordering::Relaxed)
    }

    pub fn http_errors_total(&self) -> u64 {
        self.http_errors_total.load(Ordering::Relaxed)
    }

    pub fn http_duration_total_ms(&self) -> u64 {
        self.http_duration_total_ms.load(Ordering::Relaxed)
    }

    /// Get average HTTP request duration in milliseconds.
    pub fn http_duration_avg_ms(&self) -> f64 {
        let total = self.http_duration_total_ms();
        let count = self.http_requests_total();
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn entries_indexed_total(&self) -> u64 {
        self.entries_indexed_total.load(Ordering::Relaxed)
    }

    pub fn tombstones_total(&self) -> u64 {
        self.tombstones_total.load(Ordering::Relaxed)
    }

    pub fn version_conflicts_total(&self) -> u64 {
        self.version_conflicts_total.load(Ordering::Relaxed)
    }

    pub fn transient_failures_total(&self) -> u64 {
        self.transient_failures_total.load(Ordering::Relaxed)
    }

    pub fn malformed_skipped_total(&self) -> u64 {
        self.malformed_skipped_total.load(Ordering::Relaxed)
    }

    pub fn passes_total(&self) -> u64 {
        self.passes_total.load(Ordering::Relaxed)
    }

    pub fn searches_total(&self) -> u64 {
        self.searches_total.load(Ordering::Relaxed)
    }

    /// Get a summary of all metrics.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            http_requests_total: self.http_requests_total(),
            http_errors_total: self.http_errors_total(),
            http_duration_avg_ms: self.http_duration_avg_ms(),
            entries_indexed_total: self.entries_indexed_total(),
            tombstones_total: self.tombstones_total(),
            version_conflicts_total: self.version_conflicts_total(),
            transient_failures_total: self.transient_failures_total(),
            malformed_skipped_total: self.malformed_skipped_total(),
            passes_total: self.passes_total(),
            searches_total: self.searches_total(),
        }
    }
}

/// A snapshot of metrics values.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub http_duration_avg_ms: f64,
    pub entries_indexed_total: u64,
    pub tombstones_total: u64,
    pub version_conflicts_total: u64,
    pub transient_failures_total: u64,
    pub malformed_skipped_total: u64,
    pub passes_total: u64,
    pub searches_total: u64,
}

/// A timer for tracking operation duration.
pub struct Timer {
    start: Instant,
    operation: String,
}

impl Timer {
    /// Start a new timer for the given operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
        }
    }

    /// Finish the timer and return the elapsed time in milliseconds.
    pub fn finish(self) -> u128 {
        let duration_ms = self.start.elapsed().as_millis();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration_ms,
            "Operation completed"
        );
        duration_ms
    }

    /// Finish the timer with a specific status.
    pub fn finish_with_status(self, success: bool) -> u128 {
        let duration_ms = self.start.elapsed().as_millis();
        if success {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration_ms,
                "Operation succeeded"
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                duration_ms = duration_ms,
                "Operation failed"
            );
        }
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.http_requests_total(), 0);
        assert_eq!(metrics.entries_indexed_total(), 0);
        assert_eq!(metrics.http_duration_avg_ms(), 0.0);
    }

    #[test]
    fn test_average_duration() {
        let metrics = Metrics::new();
        metrics.record_http_request(Duration::from_millis(100));
        metrics.record_http_request(Duration::from_millis(200));
        assert_eq!(metrics.http_requests_total(), 2);
        assert_eq!(metrics.http_duration_total_ms(), 300);
        assert_eq!(metrics.http_duration_avg_ms(), 150.0);
    }

    #[test]
    fn test_pipeline_counters_in_summary() {
        let metrics = Metrics::new();
        metrics.record_indexed();
        metrics.record_indexed();
        metrics.record_tombstone();
        metrics.record_version_conflict();
        metrics.record_malformed();
        metrics.record_pass();

        let summary = metrics.summary();
        assert_eq!(summary.entries_indexed_total, 2);
        assert_eq!(summary.tombstones_total, 1);
        assert_eq!(summary.version_conflicts_total, 1);
        assert_eq!(summary.malformed_skipped_total, 1);
        assert_eq!(summary.passes_total, 1);
        assert_eq!(summary.transient_failures_total, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let m1 = metrics.clone();
        let m2 = metrics.clone();

        let h1 = thread::spawn(move || (0..100).for_each(|_| m1.record_search()));
        let h2 = thread::spawn(move || (0..100).for_each(|_| m2.record_search()));
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(metrics.searches_total(), 200);
    }

    #[test]
    fn test_timer_finish() {
        let timer = Timer::new("test_op");
        thread::sleep(Duration::from_millis(5));
        assert!(timer.finish() >= 5);
        assert!(Timer::new("failing_op").finish_with_status(false) < 1000);
    }
}
