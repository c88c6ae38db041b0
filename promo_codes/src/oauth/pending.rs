//! Pending-authorization store.

use super::{
    errors::{OAuthError, OAuthResult},
    models::PendingAuthorization,
    pkce,
};
use crate::kv::{KvError, KvStore, Namespace, keys};
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// How long a started login may take before its callback is refused (10 minutes)
pub const PENDING_AUTH_TTL: Duration = Duration::from_secs(10 * 60);

/// Longest `state` accepted from a callback
const MAX_STATE_LEN: usize = 128;

/// Holds the verifier of each in-flight login, keyed by `state`
#[derive(Clone)]
pub struct PendingAuthStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl PendingAuthStore {
    /// Create a store with the default 10 minute TTL
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: PENDING_AUTH_TTL,
        }
    }

    /// Override the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record a new login attempt
    ///
    /// # Arguments
    ///
    /// * `verifier` - PKCE code verifier for this attempt
    ///
    /// # Returns
    ///
    /// * `OAuthResult<String>` - Fresh `state` to send to the provider
    pub async fn begin(&self, verifier: &str) -> OAuthResult<String> {
        let state = pkce::new_state();
        let record = PendingAuthorization {
            state: state.clone(),
            code_verifier: verifier.to_string(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_string(&record).map_err(|e| KvError::Malformed {
            key: keys::pkce_session(&state),
            reason: e.to_string(),
        })?;
        self.store
            .put(
                Namespace::Sessions,
                &keys::pkce_session(&state),
                &value,
                Some(self.ttl),
            )
            .await?;

        debug!("Pending authorization stored");
        Ok(state)
    }

    /// Recover and remove the verifier for a callback `state`
    ///
    /// The record is deleted by the same store call that reads it, so a
    /// replayed callback finds nothing.
    ///
    /// # Errors
    ///
    /// * `OAuthError::InvalidState` - Unknown, already used or expired state
    /// * `OAuthError::Store` - Store unreachable or record unreadable
    pub async fn consume(&self, state: &str) -> OAuthResult<String> {
        if state.is_empty() || state.len() > MAX_STATE_LEN {
            return Err(OAuthError::InvalidState);
        }

        let key = keys::pkce_session(state);
        let raw = self
            .store
            .take(Namespace::Sessions, &key)
            .await?
            .ok_or(OAuthError::InvalidState)?;

        let record: PendingAuthorization =
            serde_json::from_str(&raw).map_err(|e| KvError::Malformed {
                key,
                reason: e.to_string(),
            })?;

        if record.state != state {
            return Err(OAuthError::InvalidState);
        }

        Ok(record.code_verifier)
    }
}
