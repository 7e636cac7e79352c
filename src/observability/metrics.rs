//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reseller_calls_total` (counter): calls by operation, outcome
//! - `reseller_call_attempts_total` (counter): attempts spent, by operation
//! - `resilient_retries_total` (counter): retries by reason (network, server_error)
//! - `payment_fulfilments_total` (counter): webhook fulfilments by kind, outcome
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_retry(reason: &'static str) {
    counter!("resilient_retries_total", "reason" => reason).increment(1);
}

pub fn record_call(operation: &'static str, success: bool, attempts: u32) {
    let outcome = if success { "success" } else { "failure" };
    counter!("reseller_calls_total", "operation" => operation, "outcome" => outcome).increment(1);
    counter!("reseller_call_attempts_total", "operation" => operation).increment(u64::from(attempts));
}

pub fn record_fulfilment(kind: &'static str, outcome: &'static str) {
    counter!("payment_fulfilments_total", "kind" => kind, "outcome" => outcome).increment(1);
}
