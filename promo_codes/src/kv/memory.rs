//! In-process key-value store.

use super::{KvResult, KvStore, Namespace};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Memory-backed [`KvStore`]
///
/// Each namespace is an ordered map so prefix listings come back sorted, the
/// same as the PostgreSQL backend. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    data: Arc<RwLock<HashMap<Namespace, BTreeMap<String, Entry>>>>,
}

impl MemoryKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries in a namespace
    pub async fn len(&self, ns: Namespace) -> usize {
        let now = Instant::now();
        let data = self.data.read().await;
        data.get(&ns)
            .map(|m| m.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Whether a namespace holds no live entries
    pub async fn is_empty(&self, ns: Namespace) -> bool {
        self.len(ns).await == 0
    }
}

fn expiry(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|t| Instant::now() + t)
}

/// Drop expired entries; runs under the write lock
fn sweep(map: &mut BTreeMap<String, Entry>, now: Instant) {
    map.retain(|_, e| e.is_live(now));
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let data = self.data.read().await;
        Ok(data
            .get(&ns)
            .and_then(|m| m.get(key))
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn put(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let map = data.entry(ns).or_default();
        sweep(map, now);
        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        ns: Namespace,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let map = data.entry(ns).or_default();
        sweep(map, now);

        if map.contains_key(key) {
            return Ok(false);
        }

        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, ns: Namespace, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        Ok(data
            .get_mut(&ns)
            .and_then(|m| m.remove(key))
            .is_some_and(|e| e.is_live(now)))
    }

    async fn delete_if_eq(&self, ns: Namespace, key: &str, expected: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let Some(map) = data.get_mut(&ns) else {
            return Ok(false);
        };

        let matches = map
            .get(key)
            .is_some_and(|e| e.is_live(now) && e.value == expected);
        if matches {
            map.remove(key);
        }
        Ok(matches)
    }

    async fn take(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        Ok(data
            .get_mut(&ns)
            .and_then(|m| m.remove(key))
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>> {
        let now = Instant::now();
        let data = self.data.read().await;
        Ok(data
            .get(&ns)
            .map(|m| {
                m.range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .filter(|(_, e)| e.is_live(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryKvStore::new();
        store
            .put(Namespace::Codes, "code:A", "A", None)
            .await
            .unwrap();

        assert_eq!(
            store.get(Namespace::Codes, "code:A").await.unwrap(),
            Some("A".to_string())
        );
        assert!(store.delete(Namespace::Codes, "code:A").await.unwrap());
        assert!(!store.delete(Namespace::Codes, "code:A").await.unwrap());
        assert_eq!(store.get(Namespace::Codes, "code:A").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryKvStore::new();
        store
            .put(Namespace::Sessions, "k", "session", None)
            .await
            .unwrap();

        assert_eq!(store.get(Namespace::Codes, "k").await.unwrap(), None);
        assert_eq!(store.len(Namespace::Sessions).await, 1);
        assert!(store.is_empty(Namespace::Codes).await);
    }

    #[tokio::test]
    async fn test_put_if_absent_only_first_wins() {
        let store = MemoryKvStore::new();
        assert!(
            store
                .put_if_absent(Namespace::Codes, "claimed_user:1", "A", None)
                .await
                .unwrap()
        );
        assert!(
            !store
                .put_if_absent(Namespace::Codes, "claimed_user:1", "B", None)
                .await
                .unwrap()
        );
        assert_eq!(
            store.get(Namespace::Codes, "claimed_user:1").await.unwrap(),
            Some("A".to_string())
        );
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = MemoryKvStore::new();
        store
            .put(Namespace::Sessions, "pkce_session:s", "v", None)
            .await
            .unwrap();

        assert_eq!(
            store.take(Namespace::Sessions, "pkce_session:s").await.unwrap(),
            Some("v".to_string())
        );
        assert_eq!(
            store.take(Namespace::Sessions, "pkce_session:s").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_if_eq() {
        let store = MemoryKvStore::new();
        store.put(Namespace::Codes, "k", "A", None).await.unwrap();

        assert!(!store.delete_if_eq(Namespace::Codes, "k", "B").await.unwrap());
        assert!(store.delete_if_eq(Namespace::Codes, "k", "A").await.unwrap());
        assert_eq!(store.get(Namespace::Codes, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = MemoryKvStore::new();
        store
            .put(
                Namespace::Sessions,
                "pkce_session:x",
                "v",
                Some(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(
            store.get(Namespace::Sessions, "pkce_session:x").await.unwrap(),
            None
        );
        assert!(
            store
                .list_keys(Namespace::Sessions, "pkce_session:")
                .await
                .unwrap()
                .is_empty()
        );
        // An expired key can be claimed again
        assert!(
            store
                .put_if_absent(Namespace::Sessions, "pkce_session:x", "w", None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        let store = MemoryKvStore::new();
        for state in ["a", "b", "c"] {
            store
                .put(
                    Namespace::Sessions,
                    &format!("pkce_session:{state}"),
                    "v",
                    Some(Duration::from_millis(20)),
                )
                .await
                .unwrap();
        }
        store
            .put(Namespace::Codes, "code:A", "A", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(
            store
                .put_if_absent(Namespace::Sessions, "user_session:s", "v", None)
                .await
                .unwrap()
        );

        let data = store.data.read().await;
        let sessions: Vec<_> = data[&Namespace::Sessions].keys().cloned().collect();
        assert_eq!(sessions, vec!["user_session:s"]);
        // Other namespaces are swept by their own writes
        assert_eq!(data[&Namespace::Codes].len(), 1);
    }

    #[tokio::test]
    async fn test_list_keys_sorted_by_prefix() {
        let store = MemoryKvStore::new();
        for key in ["code:C", "code:A", "claimed_user:9", "code:B"] {
            store.put(Namespace::Codes, key, "x", None).await.unwrap();
        }

        let keys = store.list_keys(Namespace::Codes, "code:").await.unwrap();
        assert_eq!(keys, vec!["code:A", "code:B", "code:C"]);
    }
}
