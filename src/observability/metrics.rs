//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_rate_limited_total` (counter): requests denied by the limiter
//! - `shield_url_rejected_total` (counter): outbound URLs refused, by reason
//! - `shield_fetch_outcomes_total` (counter): pipeline results, by outcome
//! - `shield_circuit_transitions_total` (counter): breaker state changes, by target state
//! - `shield_fetch_duration_seconds` (histogram): outbound call latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rate_limited() {
    metrics::counter!("shield_rate_limited_total").increment(1);
}

pub fn record_url_rejected(reason: &'static str) {
    metrics::counter!("shield_url_rejected_total", "reason" => reason).increment(1);
}

pub fn record_fetch_outcome(outcome: &'static str, start: Instant) {
    metrics::counter!("shield_fetch_outcomes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("shield_fetch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_transition(to: &'static str) {
    metrics::counter!("shield_circuit_transitions_total", "to" => to).increment(1);
}
