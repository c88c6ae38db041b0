//! Namespaced key-value storage.
//!
//! Every piece of shared state (pending authorizations, sessions, the code
//! pool and the claim map) lives behind the [`KvStore`] trait. Handlers never
//! coordinate through process memory; the store is injected wherever it is
//! needed so a request can land on any instance.
//!
//! The trait assumes per-key linearizability only. There are no multi-key
//! transactions; callers that need more build it from the conditional
//! single-key operations ([`KvStore::put_if_absent`], [`KvStore::take`],
//! [`KvStore::delete_if_eq`]).
//!
//! Two implementations are provided:
//! - [`PgKvStore`]: durable, backed by a PostgreSQL table
//! - [`MemoryKvStore`]: in-process, for tests and local development

pub mod errors;
pub mod keys;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;

pub use errors::{KvError, KvResult};
pub use memory::MemoryKvStore;
pub use postgres::PgKvStore;

/// Logical namespace of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Pending authorizations and login sessions
    Sessions,
    /// Redemption code pool and claim records
    Codes,
}

impl Namespace {
    /// Stable name used as the partition column by durable backends
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Sessions => "user_sessions",
            Namespace::Codes => "redemption_codes",
        }
    }
}

/// Trait for namespaced key-value storage with optional per-key TTL
///
/// Expired entries behave exactly like absent ones for every operation.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a live value
    async fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>>;

    /// Write a value unconditionally, replacing any previous one
    async fn put(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<()>;

    /// Write a value only if no live value exists
    ///
    /// Returns `true` when this call created the entry.
    async fn put_if_absent(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool>;

    /// Delete a key
    ///
    /// Returns `true` when a live value was removed by this call.
    async fn delete(&self, ns: Namespace, key: &str) -> KvResult<bool>;

    /// Delete a key only if it still holds `expected`
    async fn delete_if_eq(&self, ns: Namespace, key: &str, expected: &str) -> KvResult<bool>;

    /// Read and delete a key in one step
    ///
    /// At most one concurrent caller observes `Some` for a given entry.
    async fn take(&self, ns: Namespace, key: &str) -> KvResult<Option<String>>;

    /// List live keys starting with `prefix`, sorted ascending
    async fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>>;

    /// Check that the backend is reachable
    async fn ping(&self) -> KvResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_names_are_distinct() {
        assert_ne!(Namespace::Sessions.as_str(), Namespace::Codes.as_str());
    }
}
