//! Prometheus Metrics for ingestion passes
//!
//! Metrics include:
//! - fetch outcomes per endpoint (data / empty / hard_limit)
//! - fetch latency per endpoint (histogram)
//! - records inserted and insert failures by reason
//! - cursor steps opened by the traversal driver

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use tracing::error;

// ============================================
// METRIC DEFINITIONS
// ============================================

pub const ENDPOINT_COMMENTS: &str = "comments_show";
pub const ENDPOINT_TIMELINE: &str = "statuses_timeline";
pub const ENDPOINT_STATUS: &str = "statuses_show";

static FETCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "weibo_fetch_outcomes_total",
        "Upstream fetches by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .expect("Failed to create fetch_outcomes metric")
});

static FETCH_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    register_histogram_vec!(
        HistogramOpts::new("weibo_fetch_latency_seconds", "Latency of upstream fetches in seconds").buckets(buckets),
        &["endpoint"]
    )
    .expect("Failed to create fetch_latency metric")
});

static RECORDS_INSERTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "weibo_records_inserted_total",
        "Records successfully inserted per collection",
        &["collection"]
    )
    .expect("Failed to create records_inserted metric")
});

static INSERT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "weibo_insert_failures_total",
        "Insert attempts that did not land, by collection and reason",
        &["collection", "reason"]
    )
    .expect("Failed to create insert_failures metric")
});

static TRAVERSAL_STEPS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "weibo_traversal_steps_total",
        "Cursor windows opened by the traversal driver"
    )
    .expect("Failed to create traversal_steps metric")
});

// ============================================
// METRICS API
// ============================================

pub fn record_fetch_outcome(endpoint: &str, outcome: &str) {
    FETCH_OUTCOMES.with_label_values(&[endpoint, outcome]).inc();
}

pub fn record_fetch_latency(endpoint: &str, latency_secs: f64) {
    FETCH_LATENCY.with_label_values(&[endpoint]).observe(latency_secs);
}

pub fn record_inserted(collection: &str, count: u64) {
    RECORDS_INSERTED.with_label_values(&[collection]).inc_by(count);
}

pub fn record_insert_failure(collection: &str, reason: &str) {
    INSERT_FAILURES.with_label_values(&[collection, reason]).inc();
}

pub fn record_traversal_step() {
    TRAVERSAL_STEPS.inc();
}

// ============================================
// METRICS COLLECTION
// ============================================

/// Collects all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// Measures one upstream fetch; records latency when dropped.
pub struct FetchTimer {
    endpoint: &'static str,
    start: std::time::Instant,
}

impl FetchTimer {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        record_fetch_latency(self.endpoint, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metrics() {
        record_fetch_outcome(ENDPOINT_COMMENTS, "hard_limit");
        record_inserted("comments", 3);
        record_insert_failure("comments", "duplicate");
        record_traversal_step();
        {
            let _timer = FetchTimer::new(ENDPOINT_STATUS);
        }

        let metrics = gather_metrics();
        assert!(metrics.contains("weibo_fetch_outcomes_total"));
        assert!(metrics.contains("weibo_records_inserted_total"));
        assert!(metrics.contains("weibo_insert_failures_total"));
        assert!(metrics.contains("weibo_traversal_steps_total"));
        assert!(metrics.contains("weibo_fetch_latency_seconds"));
    }
}
