//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Libris metrics
pub const METRICS_PREFIX: &str = "libris";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_records_written_total", METRICS_PREFIX),
        Unit::Count,
        "Catalog records created, updated or deleted"
    );

    describe_counter!(
        format!("{}_protected_deletes_total", METRICS_PREFIX),
        Unit::Count,
        "Deletes refused because books still reference the record"
    );

    describe_counter!(
        format!("{}_images_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Thumbnails produced by the image pipeline"
    );

    describe_histogram!(
        format!("{}_image_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Image pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_validation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Form submissions rejected by validation"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a catalog write (`operation` is create, update or delete)
pub fn record_write(entity: &'static str, operation: &'static str) {
    counter!(
        format!("{}_records_written_total", METRICS_PREFIX),
        "entity" => entity,
        "operation" => operation
    )
    .increment(1);
}

/// Record a delete refused by a protecting reference
pub fn record_protected_delete(entity: &'static str) {
    counter!(
        format!("{}_protected_deletes_total", METRICS_PREFIX),
        "entity" => entity
    )
    .increment(1);
}

/// Record one run of the image pipeline
pub fn record_image(duration_secs: f64, kind: &'static str, fell_back: bool) {
    let outcome = if fell_back { "default" } else { "source" };

    counter!(
        format!("{}_images_processed_total", METRICS_PREFIX),
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_image_duration_seconds", METRICS_PREFIX),
        "kind" => kind
    )
    .record(duration_secs);
}

/// Record a rejected form
pub fn record_validation_failure(form: &'static str) {
    counter!(
        format!("{}_validation_failures_total", METRICS_PREFIX),
        "form" => form
    )
    .increment(1);
}
