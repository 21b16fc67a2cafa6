//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total` (counter): operations by dependency and outcome
//! - `resilience_retries_total` (counter): retries by dependency and error kind
//! - `resilience_breaker_transitions_total` (counter): transitions by target state
//! - `resilience_short_circuits_total` (counter): calls rejected by an open breaker
//! - `resilience_cache_lookups_total` (counter): hits, misses and backend errors
//! - `resilience_fallbacks_total` (counter): degraded results by operation
//! - `resilience_dependency_health` (gauge): 0=healthy, 1=degraded, 2=unhealthy
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the Prometheus recorder
//! - Labels are dependency ids and small fixed vocabularies only

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(dependency: &str, outcome: &'static str) {
    metrics::counter!(
        "resilience_calls_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry(dependency: &str, kind: &'static str) {
    metrics::counter!(
        "resilience_retries_total",
        "dependency" => dependency.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_breaker_transition(dependency: &str, to: &'static str) {
    metrics::counter!(
        "resilience_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_short_circuit(dependency: &str) {
    metrics::counter!("resilience_short_circuits_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("resilience_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_fallback(operation: &str, reason: &'static str) {
    metrics::counter!(
        "resilience_fallbacks_total",
        "operation" => operation.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_dependency_health(dependency: &str, level: u8) {
    metrics::gauge!("resilience_dependency_health", "dependency" => dependency.to_string()).set(f64::from(level));
}
