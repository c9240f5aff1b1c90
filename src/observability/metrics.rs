//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker, chain and HTTP metrics
//! - Install the Prometheus recorder whose handle `GET /metrics` renders
//!
//! # Metrics
//! - `circuit_breaker_requests_total` (counter): calls seen, by breaker
//! - `circuit_breaker_successes_total` (counter): by breaker
//! - `circuit_breaker_failures_total` (counter): errors and timeouts, by breaker
//! - `circuit_breaker_timeouts_total` (counter): by breaker
//! - `circuit_breaker_rejections_total` (counter): refused while open, by breaker
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `fallback_tier_usage_total` (counter): responses served, by tier
//! - `response_cache_entries` (gauge): in-memory cache size
//! - `http_requests_total` (counter) / `http_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Breaker counters move in lockstep with the breaker's own lifetime
//!   totals, so the two views never disagree
//! - Recording is a no-op until a recorder is installed (tests, disabled metrics)

use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::resilience::CircuitState;

/// Install the global Prometheus recorder.
///
/// Returns `None` (and logs) if a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            tracing::info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Record the outcome of an admitted call: `success`, `failure` or `timeout`.
pub fn record_outcome(breaker: &str, outcome: &'static str) {
    let breaker = breaker.to_string();
    counter!("circuit_breaker_requests_total", "breaker" => breaker.clone()).increment(1);
    match outcome {
        "success" => {
            counter!("circuit_breaker_successes_total", "breaker" => breaker).increment(1);
        }
        "timeout" => {
            counter!("circuit_breaker_failures_total", "breaker" => breaker.clone()).increment(1);
            counter!("circuit_breaker_timeouts_total", "breaker" => breaker).increment(1);
        }
        _ => {
            counter!("circuit_breaker_failures_total", "breaker" => breaker).increment(1);
        }
    }
}

/// Record a call refused while the circuit was open.
pub fn record_rejection(breaker: &str) {
    let breaker = breaker.to_string();
    counter!("circuit_breaker_requests_total", "breaker" => breaker.clone()).increment(1);
    counter!("circuit_breaker_rejections_total", "breaker" => breaker).increment(1);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(state.as_gauge());
}

pub fn record_tier_usage(tier: &str) {
    counter!("fallback_tier_usage_total", "tier" => tier.to_string()).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("response_cache_entries").set(entries as f64);
}

/// Record a served HTTP request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("http_requests_total", "route" => route, "status" => status.clone()).increment(1);
    histogram!("http_request_duration_seconds", "route" => route, "status" => status)
        .record(start.elapsed().as_secs_f64());
}
