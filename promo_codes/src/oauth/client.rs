//! Identity provider client.

use super::{
    errors::{OAuthError, OAuthResult},
    models::{FollowingPage, OAuthClientConfig, ProfileEnvelope, TokenResponse, UserProfile},
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::time::Duration;

/// Default deadline for each provider call
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on following-list pages scanned per check
const MAX_FOLLOWING_PAGES: usize = 15;

/// Page size requested from the following endpoint
const FOLLOWING_PAGE_SIZE: &str = "1000";

/// Trait for the OAuth 2.0 identity provider
///
/// Every call is a single attempt. Failures are terminal for the login that
/// triggered them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trade an authorization code and PKCE verifier for an access token
    async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> OAuthResult<TokenResponse>;

    /// Fetch the profile of the token's owner
    async fn fetch_profile(&self, access_token: &str) -> OAuthResult<UserProfile>;

    /// Whether `user_id` follows `target_id`
    async fn is_following(
        &self,
        access_token: &str,
        user_id: &str,
        target_id: &str,
    ) -> OAuthResult<bool>;
}

/// HTTP implementation of [`IdentityProvider`]
#[derive(Clone)]
pub struct HttpIdentityProvider {
    http: Client,
    config: OAuthClientConfig,
}

impl HttpIdentityProvider {
    /// Create a client with a per-request deadline
    ///
    /// # Errors
    ///
    /// * `OAuthError::Network` - HTTP client could not be built
    pub fn new(config: OAuthClientConfig, timeout: Duration) -> OAuthResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("promo_codes/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Provider settings
    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> OAuthResult<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier),
        ];

        let mut request = self.http.post(&self.config.token_url).form(&form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token exchange failed ({}): {}", status, body);
            return Err(OAuthError::TokenExchangeFailed {
                status: status.as_u16(),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::InvalidResponse(format!("token response: {e}")))
    }

    async fn fetch_profile(&self, access_token: &str) -> OAuthResult<UserProfile> {
        let response = self
            .http
            .get(&self.config.user_url)
            .query(&[("user.fields", "profile_image_url")])
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Profile fetch failed ({})", status);
            return Err(OAuthError::ProfileFetchFailed {
                status: status.as_u16(),
            });
        }

        let envelope = response
            .json::<ProfileEnvelope>()
            .await
            .map_err(|e| OAuthError::InvalidResponse(format!("profile response: {e}")))?;

        if envelope.data.id.is_empty() {
            return Err(OAuthError::InvalidResponse(
                "profile response: empty user id".to_string(),
            ));
        }

        Ok(envelope.data)
    }

    async fn is_following(
        &self,
        access_token: &str,
        user_id: &str,
        target_id: &str,
    ) -> OAuthResult<bool> {
        let url = self.config.following_url_for(user_id);
        let mut next_token: Option<String> = None;

        for page in 0..MAX_FOLLOWING_PAGES {
            let mut request = self
                .http
                .get(&url)
                .query(&[("max_results", FOLLOWING_PAGE_SIZE)])
                .bearer_auth(access_token);
            if let Some(token) = &next_token {
                request = request.query(&[("pagination_token", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                warn!("Following list fetch failed ({})", status);
                return Err(OAuthError::RelationshipFetchFailed {
                    status: status.as_u16(),
                });
            }

            let body = response
                .json::<FollowingPage>()
                .await
                .map_err(|e| OAuthError::InvalidResponse(format!("following response: {e}")))?;

            if body
                .data
                .unwrap_or_default()
                .iter()
                .any(|u| u.id == target_id)
            {
                return Ok(true);
            }

            next_token = body.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                return Ok(false);
            }
            debug!("Following list page {} scanned, continuing", page + 1);
        }

        warn!(
            "Following list for user {} exceeds {} pages; treating as not following",
            user_id, MAX_FOLLOWING_PAGES
        );
        Ok(false)
    }
}
