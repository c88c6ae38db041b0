//! PostgreSQL-backed key-value store.
#![allow(clippy::needless_raw_string_hashes)]

use super::{KvResult, KvStore, Namespace};
use crate::db::timeouts::{DEFAULT_QUERY_TIMEOUT, MAINTENANCE_TIMEOUT, with_timeout};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;

/// Durable [`KvStore`] on a single `kv_entries` table
///
/// Each operation is one statement, so PostgreSQL's row locking gives the
/// per-key linearizability the trait promises. Expiry is evaluated against the
/// database clock (`NOW()`); expired rows stay on disk until
/// [`PgKvStore::purge_expired`] removes them but are never returned.
#[derive(Clone)]
pub struct PgKvStore {
    pool: Arc<PgPool>,
    op_timeout: Duration,
}

impl PgKvStore {
    /// Create a store on an existing pool with the default per-operation deadline
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            op_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the per-operation deadline
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Create the backing table if it does not exist
    pub async fn ensure_schema(&self) -> KvResult<()> {
        with_timeout(
            MAINTENANCE_TIMEOUT,
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS kv_entries (
                    namespace  TEXT        NOT NULL,
                    key        TEXT        NOT NULL,
                    value      TEXT        NOT NULL,
                    expires_at TIMESTAMPTZ,
                    PRIMARY KEY (namespace, key)
                )
                "#,
            )
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    /// Delete rows whose TTL has elapsed
    ///
    /// # Returns
    ///
    /// * `KvResult<u64>` - Number of rows removed
    pub async fn purge_expired(&self) -> KvResult<u64> {
        let result = with_timeout(
            MAINTENANCE_TIMEOUT,
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= NOW()")
                .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

fn ttl_secs(ttl: Option<Duration>) -> Option<f64> {
    ttl.map(|t| t.as_secs_f64())
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        let row = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT value FROM kv_entries
                WHERE namespace = $1 AND key = $2
                  AND (expires_at IS NULL OR expires_at > NOW())
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn put(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                INSERT INTO kv_entries (namespace, key, value, expires_at)
                VALUES ($1, $2, $3, NOW() + ($4::float8 * INTERVAL '1 second'))
                ON CONFLICT (namespace, key)
                DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .bind(value)
            .bind(ttl_secs(ttl))
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool> {
        // An expired row is overwritten in place; a live one blocks the insert
        let row = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                INSERT INTO kv_entries (namespace, key, value, expires_at)
                VALUES ($1, $2, $3, NOW() + ($4::float8 * INTERVAL '1 second'))
                ON CONFLICT (namespace, key)
                DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
                WHERE kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= NOW()
                RETURNING key
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .bind(value)
            .bind(ttl_secs(ttl))
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.is_some())
    }

    async fn delete(&self, ns: Namespace, key: &str) -> KvResult<bool> {
        let row = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                DELETE FROM kv_entries
                WHERE namespace = $1 AND key = $2
                RETURNING (expires_at IS NULL OR expires_at > NOW()) AS live
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.is_some_and(|r| r.get::<bool, _>("live")))
    }

    async fn delete_if_eq(&self, ns: Namespace, key: &str, expected: &str) -> KvResult<bool> {
        let row = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                DELETE FROM kv_entries
                WHERE namespace = $1 AND key = $2 AND value = $3
                  AND (expires_at IS NULL OR expires_at > NOW())
                RETURNING key
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .bind(expected)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.is_some())
    }

    async fn take(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        let row = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                DELETE FROM kv_entries
                WHERE namespace = $1 AND key = $2
                RETURNING value, (expires_at IS NULL OR expires_at > NOW()) AS live
                "#,
            )
            .bind(ns.as_str())
            .bind(key)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row
            .filter(|r| r.get::<bool, _>("live"))
            .map(|r| r.get("value")))
    }

    async fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>> {
        let rows = with_timeout(
            self.op_timeout,
            sqlx::query(
                r#"
                SELECT key FROM kv_entries
                WHERE namespace = $1 AND starts_with(key, $2)
                  AND (expires_at IS NULL OR expires_at > NOW())
                ORDER BY key COLLATE "C"
                "#,
            )
            .bind(ns.as_str())
            .bind(prefix)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }

    async fn ping(&self) -> KvResult<()> {
        with_timeout(
            self.op_timeout,
            sqlx::query("SELECT 1").execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs() {
        assert_eq!(ttl_secs(None), None);
        assert_eq!(ttl_secs(Some(Duration::from_millis(1500))), Some(1.5));
    }
}
