//! Deadlines for store round-trips.
//!
//! Every call to the durable backend is bounded; an elapsed deadline is
//! reported as [`KvError::Timeout`] and handled like any other store failure.

use crate::kv::{KvError, KvResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for a single store operation (2 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for schema setup and maintenance statements (30 seconds)
pub const MAINTENANCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a query future with a deadline
///
/// # Example
///
/// ```no_run
/// use promo_codes::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> promo_codes::kv::KvResult<()> {
/// with_timeout(DEFAULT_QUERY_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> KvResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(KvError::from),
        Err(_) => Err(KvError::Timeout(duration)),
    }
}
