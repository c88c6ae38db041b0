//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; the subscriber installed
//! here bridges those records into `tracing` so both end up in one stream.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn,reqwest=warn";

/// Initialize structured logging
///
/// Levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use pc_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `user_id` - Provider user id, when known
/// * `request_id` - Correlation id of the triggering request
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use pc_server::logging::log_security_event;
///
/// log_security_event(
///     "invalid_oauth_state",
///     None,
///     Some("3f2c9a4e-0000-4000-8000-000000000000"),
///     "Callback state matched no pending authorization",
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    user_id: Option<&str>,
    request_id: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        request_id = request_id,
        "SECURITY: {}",
        message
    );
}

/// Log the outcome of a claim request
///
/// # Arguments
///
/// * `user_id` - Claiming user
/// * `outcome` - `claimed`, `repeat` or the rejection code
/// * `duration_ms` - Allocation time in milliseconds
pub fn log_claim(user_id: &str, outcome: &str, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            user_id = user_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "PERFORMANCE: Slow claim"
        );
    } else {
        tracing::info!(
            user_id = user_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "Claim processed"
        );
    }
}
