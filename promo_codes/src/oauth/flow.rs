//! Login state machine: start → provider redirect → callback → session.

use super::{
    client::IdentityProvider,
    errors::{OAuthError, OAuthResult},
    models::OAuthClientConfig,
    pending::PendingAuthStore,
    pkce::PkcePair,
};
use crate::session::{Session, SessionStore};
use log::{info, warn};
use std::sync::Arc;
use url::Url;

/// Redirect target for a started login
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub authorization_url: Url,
    pub state: String,
}

/// Sequences the pending-authorization store, the provider and the session
/// store for one login
///
/// No step is retried. A failure anywhere in [`LoginFlow::complete`] leaves no
/// session behind; the user starts over from [`LoginFlow::start`].
#[derive(Clone)]
pub struct LoginFlow {
    config: OAuthClientConfig,
    pending: PendingAuthStore,
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
    required_follow_id: Option<String>,
}

impl LoginFlow {
    pub fn new(
        config: OAuthClientConfig,
        pending: PendingAuthStore,
        provider: Arc<dyn IdentityProvider>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            config,
            pending,
            provider,
            sessions,
            required_follow_id: None,
        }
    }

    /// Only admit users who follow this account
    pub fn with_required_follow(mut self, target_id: Option<String>) -> Self {
        self.required_follow_id = target_id.filter(|id| !id.is_empty());
        self
    }

    /// Session store used for completed logins
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Begin a login: new PKCE pair, persisted state, provider URL
    pub async fn start(&self) -> OAuthResult<LoginRedirect> {
        let pkce = PkcePair::generate();
        let state = self.pending.begin(&pkce.verifier).await?;
        let authorization_url = self.config.authorization_url(&state, &pkce.challenge)?;

        Ok(LoginRedirect {
            authorization_url,
            state,
        })
    }

    /// Finish a login from the provider callback
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the callback
    /// * `state` - State from the callback
    ///
    /// # Errors
    ///
    /// * `OAuthError::InvalidState` - State unknown, replayed or expired; the provider is not contacted
    /// * `OAuthError::TokenExchangeFailed` / `ProfileFetchFailed` / `Network` - Provider failure
    /// * `OAuthError::NotAFollower` - Follow requirement not met
    /// * `OAuthError::Store` / `Session` - Storage failure
    pub async fn complete(&self, code: &str, state: &str) -> OAuthResult<Session> {
        let verifier = self.pending.consume(state).await?;

        let token = self
            .provider
            .exchange(code, &verifier, &self.config.redirect_uri)
            .await?;
        let profile = self.provider.fetch_profile(&token.access_token).await?;

        if let Some(target) = &self.required_follow_id {
            let follows = self
                .provider
                .is_following(&token.access_token, &profile.id, target)
                .await?;
            if !follows {
                warn!("User {} does not follow {}", profile.id, target);
                return Err(OAuthError::NotAFollower);
            }
        }

        let session = self.sessions.create(&profile, &token.access_token).await?;
        info!("User {} (@{}) logged in", profile.id, profile.username);

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, MemoryKvStore, Namespace};
    use crate::oauth::models::{TokenResponse, UserProfile};
    use crate::oauth::pkce;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProvider {
        fail_exchange: bool,
        follows: bool,
        seen_verifiers: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn exchange(
            &self,
            _code: &str,
            verifier: &str,
            _redirect_uri: &str,
        ) -> OAuthResult<TokenResponse> {
            self.seen_verifiers
                .lock()
                .unwrap()
                .push(verifier.to_string());
            if self.fail_exchange {
                return Err(OAuthError::TokenExchangeFailed { status: 400 });
            }
            Ok(TokenResponse {
                access_token: "access".to_string(),
                token_type: "bearer".to_string(),
                scope: Some("users.read".to_string()),
                expires_in: Some(7200),
                refresh_token: None,
            })
        }

        async fn fetch_profile(&self, _access_token: &str) -> OAuthResult<UserProfile> {
            Ok(UserProfile {
                id: "42".to_string(),
                username: "ada".to_string(),
                name: "Ada".to_string(),
                profile_image_url: None,
            })
        }

        async fn is_following(
            &self,
            _access_token: &str,
            _user_id: &str,
            _target_id: &str,
        ) -> OAuthResult<bool> {
            Ok(self.follows)
        }
    }

    fn config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "cid".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:6970/callback".to_string(),
            auth_url: "https://provider.example/authorize".to_string(),
            token_url: "https://provider.example/token".to_string(),
            user_url: "https://provider.example/me".to_string(),
            following_url: "https://provider.example/users/{id}/following".to_string(),
            scope: "users.read".to_string(),
        }
    }

    fn build_flow(provider: Arc<FakeProvider>, kv: &MemoryKvStore) -> LoginFlow {
        let store: Arc<dyn KvStore> = Arc::new(kv.clone());
        LoginFlow::new(
            config(),
            PendingAuthStore::new(store.clone()),
            provider,
            SessionStore::new(store),
        )
    }

    #[tokio::test]
    async fn test_full_login_uses_stored_verifier() {
        let kv = MemoryKvStore::new();
        let provider = Arc::new(FakeProvider::default());
        let flow = build_flow(provider.clone(), &kv);

        let redirect = flow.start().await.unwrap();
        let challenge = redirect
            .authorization_url
            .query_pairs()
            .find(|(k, _)| k == "code_challenge")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let session = flow.complete("auth-code", &redirect.state).await.unwrap();
        assert_eq!(session.user_id, "42");

        let verifier = provider.seen_verifiers.lock().unwrap()[0].clone();
        assert_eq!(pkce::code_challenge(&verifier), challenge);
    }

    #[tokio::test]
    async fn test_replayed_callback_is_rejected_before_exchange() {
        let kv = MemoryKvStore::new();
        let provider = Arc::new(FakeProvider::default());
        let flow = build_flow(provider.clone(), &kv);

        let redirect = flow.start().await.unwrap();
        flow.complete("c", &redirect.state).await.unwrap();

        assert!(matches!(
            flow.complete("c", &redirect.state).await,
            Err(OAuthError::InvalidState)
        ));
        assert_eq!(provider.seen_verifiers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exchange_failure_creates_no_session() {
        let kv = MemoryKvStore::new();
        let provider = Arc::new(FakeProvider {
            fail_exchange: true,
            ..Default::default()
        });
        let flow = build_flow(provider, &kv);

        let redirect = flow.start().await.unwrap();
        let err = flow.complete("c", &redirect.state).await.unwrap_err();
        assert_eq!(err.detail(), "token_exchange_failed");
        assert!(kv.is_empty(Namespace::Sessions).await);
    }

    #[tokio::test]
    async fn test_follow_requirement() {
        let kv = MemoryKvStore::new();
        let flow = build_flow(Arc::new(FakeProvider::default()), &kv)
            .with_required_follow(Some("1000".to_string()));

        let redirect = flow.start().await.unwrap();
        assert!(matches!(
            flow.complete("c", &redirect.state).await,
            Err(OAuthError::NotAFollower)
        ));
        assert!(kv.is_empty(Namespace::Sessions).await);

        let follower = Arc::new(FakeProvider {
            follows: true,
            ..Default::default()
        });
        let flow = build_flow(follower, &kv).with_required_follow(Some("1000".to_string()));
        let redirect = flow.start().await.unwrap();
        assert!(flow.complete("c", &redirect.state).await.is_ok());
    }
}
