//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_sync_fetch_total` (counter): remote fetches by response code
//! - `config_sync_fetch_retries_total` (counter): retries after transport failures
//! - `config_sync_apply_total` (counter): parser applies by outcome
//! - `config_sync_fs_events_total` (counter): file system events by decision
//! - `config_sync_inflight_requests` (gauge): fetches not yet resolved
//! - `config_sync_memory_files` (gauge): entries in the memory file store
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fetch(code: u16) {
    metrics::counter!("config_sync_fetch_total", "code" => code.to_string()).increment(1);
}

pub fn record_fetch_retry() {
    metrics::counter!("config_sync_fetch_retries_total").increment(1);
}

pub fn record_apply(outcome: &'static str) {
    metrics::counter!("config_sync_apply_total", "outcome" => outcome).increment(1);
}

pub fn record_fs_event(decision: &'static str) {
    metrics::counter!("config_sync_fs_events_total", "decision" => decision).increment(1);
}

pub fn record_inflight(count: usize) {
    metrics::gauge!("config_sync_inflight_requests").set(count as f64);
}

pub fn record_memory_files(count: usize) {
    metrics::gauge!("config_sync_memory_files").set(count as f64);
}
