//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count guard decisions and config reloads
//! - Record forwarded request status and latency
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `guard_decisions_total` (counter): by decision (pass_through, halted, not_applicable)
//! - `guard_config_reloads_total` (counter): by result (applied, rejected)
//! - `proxy_requests_total` (counter): forwarded requests by method, status
//! - `proxy_request_duration_seconds` (histogram): upstream round-trip latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The guard core never touches metrics; the middleware records for it

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::Decision;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(decision: Decision) {
    metrics::counter!("guard_decisions_total", "decision" => decision.as_str()).increment(1);
}

pub fn record_reload(applied: bool) {
    let result = if applied { "applied" } else { "rejected" };
    metrics::counter!("guard_config_reloads_total", "result" => result).increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
