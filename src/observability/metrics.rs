//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingest_requests_total` (counter): requests by action and status
//! - `ingest_request_duration_seconds` (histogram): pipeline latency
//! - `ingest_rate_limited_total` (counter): rejected by the bucket
//! - `ingest_auth_failures_total` (counter): signature gate rejections
//! - `ingest_idempotency_replays_total` / `_conflicts_total` (counters)
//! - `ingest_audit_failures_total` (counter): swallowed sink errors
//! - `ingest_rate_limit_buckets` / `ingest_idempotency_records` (gauges)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record a completed request with its final status.
pub fn record_request(action: &str, status: u16, start: Instant) {
    counter!(
        "ingest_requests_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("ingest_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("ingest_rate_limited_total").increment(1);
}

/// The reason label is internal only; clients still see one
/// undifferentiated 401.
pub fn record_auth_failure(reason: &'static str) {
    counter!("ingest_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_idempotency_replay() {
    counter!("ingest_idempotency_replays_total").increment(1);
}

pub fn record_idempotency_conflict() {
    counter!("ingest_idempotency_conflicts_total").increment(1);
}

pub fn record_audit_failure() {
    counter!("ingest_audit_failures_total").increment(1);
}

/// Cache sizes, reported by the background sweeper.
pub fn record_cache_sizes(buckets: usize, idempotency_records: usize) {
    gauge!("ingest_rate_limit_buckets").set(buckets as f64);
    gauge!("ingest_idempotency_records").set(idempotency_records as f64);
}
