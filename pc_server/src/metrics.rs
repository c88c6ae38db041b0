//! Prometheus metrics for the giveaway server.
//!
//! Counters are always recorded through the `metrics` facade; they are only
//! exported when [`init_metrics`] installs the Prometheus recorder
//! (`METRICS_BIND`).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pc_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::login_started();
//! metrics::claim_outcome("claimed");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Login Metrics
// ============================================================================

/// Increment the started-logins counter.
pub fn login_started() {
    metrics::counter!("oauth_logins_started_total").increment(1);
}

/// Record a callback outcome (`success` or the error detail).
pub fn callback_outcome(outcome: &str) {
    metrics::counter!("oauth_callbacks_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Claim Metrics
// ============================================================================

/// Record a claim outcome (`claimed`, `repeat` or the error code).
pub fn claim_outcome(outcome: &str) {
    metrics::counter!("claims_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record allocation latency in milliseconds.
pub fn claim_duration_ms(duration_ms: f64) {
    metrics::histogram!("claim_duration_ms").record(duration_ms);
}

/// Set the number of codes left in the pool.
pub fn codes_available(count: usize) {
    metrics::gauge!("codes_available").set(count as f64);
}
