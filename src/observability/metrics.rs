//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define redirect metrics (resolutions, failures, latency, index size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `redirects_resolutions_total` (counter): resolutions by outcome
//!   (`exact`, `pattern`, `no_match`)
//! - `redirects_destination_failures_total` (counter): skipped candidates by
//!   reason (`not_found`, `unavailable`, `timeout`, `invalid`)
//! - `redirects_resolution_duration_seconds` (histogram): resolve latency
//! - `redirects_index_rules` (gauge): rules in the installed index
//! - `redirects_index_rebuilds_total` (counter)
//! - `redirects_index_rebuild_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::IndexStats;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_resolution(outcome: &'static str, elapsed: Duration) {
    counter!("redirects_resolutions_total", "outcome" => outcome).increment(1);
    histogram!("redirects_resolution_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_destination_failure(reason: &'static str) {
    counter!("redirects_destination_failures_total", "reason" => reason).increment(1);
}

pub fn record_rebuild(stats: &IndexStats, elapsed: Duration) {
    counter!("redirects_index_rebuilds_total").increment(1);
    histogram!("redirects_index_rebuild_duration_seconds").record(elapsed.as_secs_f64());
    gauge!("redirects_index_rules", "kind" => "exact").set(stats.exact_rules as f64);
    gauge!("redirects_index_rules", "kind" => "pattern").set(stats.pattern_rules as f64);
    gauge!("redirects_index_rules", "kind" => "skipped").set(stats.skipped_rules as f64);
}
