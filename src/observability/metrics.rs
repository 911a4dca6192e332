//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_cache_requests_total` (counter): cache outcome (hit/miss/bypass)
//! - `proxy_cache_entries` (gauge): current store size
//!
//! Metric updates are cheap no-ops until an exporter is installed, so tests
//! and cache-disabled deployments pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(error) => tracing::error!(%error, "failed to install metrics exporter"),
    }
}

/// Record one forwarded (or failed) request.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds")
        .record(start_time.elapsed().as_secs_f64());
}

/// Record a cache decision: "hit", "miss", or "bypass".
pub fn record_cache(outcome: &'static str) {
    metrics::counter!("proxy_cache_requests_total", "outcome" => outcome).increment(1);
}

/// Record the current number of stored entries.
pub fn record_cache_size(entries: usize) {
    metrics::gauge!("proxy_cache_entries").set(entries as f64);
}
