//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_requests_total` (counter): requests by method, status, route
//! - `bff_request_duration_seconds` (histogram): latency by route
//! - `bff_active_streams` (gauge): SSE relays currently open
//! - `bff_stream_rejections_total` (counter): streams refused at the ceiling
//! - `bff_upstream_errors_total` (counter): unreachable upstream by reason
//! - `bff_malformed_upstream_bodies_total` (counter): JSON bodies that failed to parse
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed, so tests need no setup
//! - Labels are bounded: route names come from the static table

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "bff_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("bff_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(reason: &'static str) {
    counter!("bff_upstream_errors_total", "reason" => reason).increment(1);
}

pub fn record_stream_opened() {
    gauge!("bff_active_streams").increment(1.0);
}

pub fn record_stream_closed() {
    gauge!("bff_active_streams").decrement(1.0);
}

pub fn record_stream_rejected() {
    counter!("bff_stream_rejections_total").increment(1);
}

pub fn record_malformed_body(route: &str) {
    counter!("bff_malformed_upstream_bodies_total", "route" => route.to_string()).increment(1);
}
