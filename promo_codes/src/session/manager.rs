//! Session store implementation.

use super::{
    errors::{SessionError, SessionResult},
    models::Session,
};
use crate::kv::{KvStore, Namespace, keys};
use crate::oauth::{UserProfile, pkce};
use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Session lifetime (24 hours); also the cookie `Max-Age`
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest session id accepted from a cookie
const MAX_SESSION_ID_LEN: usize = 128;

/// Compare-and-swap rounds on the user index before a login gives up
const MAX_INDEX_ATTEMPTS: u32 = 5;

/// Session store
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a session store with the default 24 hour TTL
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: SESSION_TTL,
        }
    }

    /// Override the session TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session for a freshly authenticated user
    ///
    /// # Arguments
    ///
    /// * `profile` - Profile returned by the identity provider
    /// * `access_token` - Provider bearer token
    ///
    /// # Returns
    ///
    /// * `SessionResult<Session>` - The stored session, with a new random id
    ///
    /// The new session replaces whatever session the user index named, which
    /// is deleted; its `created_at` carries over. Concurrent logins of one user
    /// leave exactly one live session, the last one to claim the index.
    ///
    /// # Errors
    ///
    /// * `SessionError::Contended` - Concurrent logins kept replacing the index
    /// * `SessionError::Store` - Store unreachable
    pub async fn create(
        &self,
        profile: &UserProfile,
        access_token: &str,
    ) -> SessionResult<Session> {
        let index_key = keys::user_session_index(&profile.id);
        let previous = match self.store.get(Namespace::Sessions, &index_key).await? {
            Some(id) => self.load(&id).await?,
            None => None,
        };

        let now = Utc::now();
        let session = Session {
            session_id: pkce::random_token(),
            user_id: profile.id.clone(),
            username: profile.username.clone(),
            display_name: profile.name.clone(),
            avatar_url: profile.profile_image_url.clone(),
            access_token: access_token.to_string(),
            created_at: previous.map(|s| s.created_at).unwrap_or(now),
            last_login_at: now,
        };

        let record = serde_json::to_string(&session)?;
        let row_key = keys::user_session(&session.session_id);
        self.store
            .put(Namespace::Sessions, &row_key, &record, Some(self.ttl))
            .await?;

        if let Err(e) = self.claim_index(&index_key, &session.session_id).await {
            if let Err(cleanup) = self.store.delete(Namespace::Sessions, &row_key).await {
                warn!("Failed to discard unindexed session: {}", cleanup);
            }
            return Err(e);
        }

        Ok(session)
    }

    /// Point the user index at `session_id`
    ///
    /// The index value is swapped with `delete_if_eq` then `put_if_absent`.
    /// Only the caller whose `delete_if_eq` removed a value deletes that
    /// session, so every displaced session is retired exactly once.
    async fn claim_index(&self, index_key: &str, session_id: &str) -> SessionResult<()> {
        for _ in 0..MAX_INDEX_ATTEMPTS {
            if let Some(current) = self.store.get(Namespace::Sessions, index_key).await? {
                let displaced = self
                    .store
                    .delete_if_eq(Namespace::Sessions, index_key, &current)
                    .await?;
                if !displaced {
                    continue;
                }
                self.store
                    .delete(Namespace::Sessions, &keys::user_session(&current))
                    .await?;
                debug!("Replaced previous session {}", current);
            }

            if self
                .store
                .put_if_absent(Namespace::Sessions, index_key, session_id, Some(self.ttl))
                .await?
            {
                return Ok(());
            }
        }

        Err(SessionError::Contended)
    }

    /// Look up a session by the id carried in the cookie
    ///
    /// # Errors
    ///
    /// * `SessionError::NotFound` - Unknown, expired, malformed or unreadable session
    /// * `SessionError::Store` - Store unreachable
    pub async fn get(&self, session_id: &str) -> SessionResult<Session> {
        if !is_plausible_session_id(session_id) {
            return Err(SessionError::NotFound);
        }

        self.load(session_id).await?.ok_or(SessionError::NotFound)
    }

    async fn load(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let Some(raw) = self
            .store
            .get(Namespace::Sessions, &keys::user_session(session_id))
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Discarding unreadable session record: {}", e);
                Ok(None)
            }
        }
    }
}

fn is_plausible_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvResult, MemoryKvStore};
    use async_trait::async_trait;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            username: format!("user{id}"),
            name: format!("User {id}"),
            profile_image_url: Some("https://example.com/a.png".to_string()),
        }
    }

    fn setup() -> (MemoryKvStore, SessionStore) {
        let kv = MemoryKvStore::new();
        let sessions = SessionStore::new(Arc::new(kv.clone()));
        (kv, sessions)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, sessions) = setup();
        let created = sessions.create(&profile("1"), "token-1").await.unwrap();

        let loaded = sessions.get(&created.session_id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.profile().id, "1");
        assert_eq!(loaded.access_token, "token-1");
    }

    #[tokio::test]
    async fn test_session_ids_are_random_per_login() {
        let (_, sessions) = setup();
        let a = sessions.create(&profile("1"), "t").await.unwrap();
        let b = sessions.create(&profile("1"), "t").await.unwrap();

        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.session_id.len(), 43);
    }

    #[tokio::test]
    async fn test_relogin_replaces_previous_session() {
        let (kv, sessions) = setup();
        let first = sessions.create(&profile("7"), "old").await.unwrap();
        let second = sessions.create(&profile("7"), "new").await.unwrap();

        assert!(matches!(
            sessions.get(&first.session_id).await,
            Err(SessionError::NotFound)
        ));
        let current = sessions.get(&second.session_id).await.unwrap();
        assert_eq!(current.access_token, "new");
        assert_eq!(current.created_at, first.created_at);
        assert!(current.last_login_at >= first.last_login_at);

        // One row plus one index entry
        assert_eq!(kv.len(Namespace::Sessions).await, 2);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let (_, sessions) = setup();
        assert!(matches!(
            sessions.get("does-not-exist").await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(sessions.get("").await, Err(SessionError::NotFound)));
        assert!(matches!(
            sessions.get("bad id;with=chars").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_not_found() {
        let (kv, sessions) = setup();
        kv.put(
            Namespace::Sessions,
            &keys::user_session("corrupt"),
            "{not json",
            None,
        )
        .await
        .unwrap();

        assert!(matches!(
            sessions.get("corrupt").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let (_, sessions) = setup();
        let sessions = sessions.with_ttl(Duration::from_millis(20));
        let created = sessions.create(&profile("3"), "t").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(matches!(
            sessions.get(&created.session_id).await,
            Err(SessionError::NotFound)
        ));
    }

    /// Memory store with a delay before every call, so concurrent logins interleave
    struct SlowStore(MemoryKvStore);

    impl SlowStore {
        async fn pause(&self) {
            tokio::time::sleep(Duration::from_millis(3)).await;
        }
    }

    #[async_trait]
    impl KvStore for SlowStore {
        async fn get(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
            self.pause().await;
            self.0.get(ns, key).await
        }

        async fn put(
            &self,
            ns: Namespace,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> KvResult<()> {
            self.pause().await;
            self.0.put(ns, key, value, ttl).await
        }

        async fn put_if_absent(
            &self,
            ns: Namespace,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> KvResult<bool> {
            self.pause().await;
            self.0.put_if_absent(ns, key, value, ttl).await
        }

        async fn delete(&self, ns: Namespace, key: &str) -> KvResult<bool> {
            self.pause().await;
            self.0.delete(ns, key).await
        }

        async fn delete_if_eq(&self, ns: Namespace, key: &str, expected: &str) -> KvResult<bool> {
            self.pause().await;
            self.0.delete_if_eq(ns, key, expected).await
        }

        async fn take(&self, ns: Namespace, key: &str) -> KvResult<Option<String>> {
            self.pause().await;
            self.0.take(ns, key).await
        }

        async fn list_keys(&self, ns: Namespace, prefix: &str) -> KvResult<Vec<String>> {
            self.pause().await;
            self.0.list_keys(ns, prefix).await
        }

        async fn ping(&self) -> KvResult<()> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_relogin_leaves_one_session() {
        let kv = MemoryKvStore::new();
        let sessions = SessionStore::new(Arc::new(SlowStore(kv.clone())));
        let first = sessions.create(&profile("5"), "t0").await.unwrap();

        let (p1, p2) = (profile("5"), profile("5"));
        let (a, b) = tokio::join!(
            sessions.create(&p1, "t1"),
            sessions.create(&p2, "t2"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(sessions.get(&first.session_id).await.is_err());
        let a_live = sessions.get(&a.session_id).await.is_ok();
        let b_live = sessions.get(&b.session_id).await.is_ok();
        assert!(a_live != b_live, "exactly one login survives");

        let indexed = kv
            .get(Namespace::Sessions, &keys::user_session_index("5"))
            .await
            .unwrap()
            .unwrap();
        let survivor = if a_live { &a } else { &b };
        assert_eq!(indexed, survivor.session_id);
        assert_eq!(kv.len(Namespace::Sessions).await, 2);
    }
}
