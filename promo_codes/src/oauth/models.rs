//! OAuth data models.

use super::errors::{OAuthError, OAuthResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// In-flight authorization, stored at `pkce_session:{state}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Authenticated user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// `{"data": {...}}` envelope around the profile
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub data: UserProfile,
}

/// One page of the following list
#[derive(Debug, Deserialize)]
pub(crate) struct FollowingPage {
    #[serde(default)]
    pub data: Option<Vec<RelatedUser>>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelatedUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageMeta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Identity provider client settings
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    /// Sent as HTTP Basic credentials when present (confidential client)
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_url: String,
    /// Following list URL; `{id}` is replaced with the user id
    pub following_url: String,
    pub scope: String,
}

impl OAuthClientConfig {
    /// Build the authorization redirect for a pending login
    ///
    /// # Errors
    ///
    /// * `OAuthError::Configuration` - `auth_url` is not a valid URL
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> OAuthResult<Url> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| OAuthError::Configuration(format!("auth_url: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url)
    }

    /// Following list URL for one user
    pub fn following_url_for(&self, user_id: &str) -> String {
        self.following_url.replace("{id}", user_id)
    }
}
