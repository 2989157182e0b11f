//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted connections
//! - `proxy_active_connections` (gauge): sessions currently running
//! - `proxy_sessions_total` (counter): finished sessions by outcome
//!   (`cache_hit`, `stored`, `passthrough`, `truncated`, `rejected`, `failed`)
//! - `proxy_rejections_total` (counter): policy rejections by reason
//! - `proxy_cache_lookups_total` (counter): `cached` (usable artifact) / `miss`
//! - `proxy_relayed_bytes_total` (counter): bytes written to clients
//! - `proxy_session_duration_seconds` (histogram): session wall time
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    counter!("proxy_connections_total").increment(1);
}

pub fn record_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}

pub fn record_session(outcome: &'static str, start: Instant) {
    counter!("proxy_sessions_total", "outcome" => outcome).increment(1);
    histogram!("proxy_session_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("proxy_rejections_total", "reason" => reason).increment(1);
}

/// Label for a cache lookup: whether a usable artifact was found.
pub fn cache_lookup_label(has_artifact: bool) -> &'static str {
    if has_artifact {
        "cached"
    } else {
        "miss"
    }
}

pub fn record_cache_lookup(has_artifact: bool) {
    counter!("proxy_cache_lookups_total", "result" => cache_lookup_label(has_artifact)).increment(1);
}

pub fn record_relayed_bytes(bytes: u64) {
    counter!("proxy_relayed_bytes_total").increment(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_lookup_labels() {
        assert_eq!(cache_lookup_label(true), "cached");
        assert_eq!(cache_lookup_label(false), "miss");
    }

    #[test]
    fn recorders_are_noops_without_exporter() {
        record_cache_lookup(true);
        record_session("stored", Instant::now());
        record_relayed_bytes(42);
    }
}
