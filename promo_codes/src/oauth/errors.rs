//! OAuth flow error types.

use crate::kv::KvError;
use crate::session::SessionError;
use thiserror::Error;

/// OAuth login errors
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Callback `state` matches no pending authorization (forged, replayed or expired)
    #[error("Unknown or expired OAuth state")]
    InvalidState,

    /// Token endpoint answered with a non-success status
    #[error("Token exchange failed with status {status}")]
    TokenExchangeFailed { status: u16 },

    /// Profile endpoint answered with a non-success status
    #[error("Profile fetch failed with status {status}")]
    ProfileFetchFailed { status: u16 },

    /// Relationships endpoint answered with a non-success status
    #[error("Relationship fetch failed with status {status}")]
    RelationshipFetchFailed { status: u16 },

    /// Transport failure or timeout talking to the provider
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider response could not be decoded
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// User does not follow the required account
    #[error("User does not follow the required account")]
    NotAFollower,

    /// Provider configuration is unusable
    #[error("Invalid OAuth configuration: {0}")]
    Configuration(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] KvError),

    /// Session creation failed
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl OAuthError {
    /// Short machine-readable reason used on the error surface
    pub fn detail(&self) -> &'static str {
        match self {
            OAuthError::InvalidState => "no_pkce_session",
            OAuthError::TokenExchangeFailed { .. } => "token_exchange_failed",
            OAuthError::ProfileFetchFailed { .. } => "user_fetch_failed",
            OAuthError::RelationshipFetchFailed { .. } => "relationship_fetch_failed",
            OAuthError::Network(_) => "network_error",
            OAuthError::InvalidResponse(_) => "invalid_provider_response",
            OAuthError::NotAFollower => "not_a_follower",
            OAuthError::Configuration(_) | OAuthError::Store(_) | OAuthError::Session(_) => {
                "server_error"
            }
        }
    }

    /// Whether the failure came from the identity provider
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            OAuthError::TokenExchangeFailed { .. }
                | OAuthError::ProfileFetchFailed { .. }
                | OAuthError::RelationshipFetchFailed { .. }
                | OAuthError::Network(_)
                | OAuthError::InvalidResponse(_)
        )
    }
}

/// Result type for OAuth operations
pub type OAuthResult<T> = Result<T, OAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_codes() {
        assert_eq!(OAuthError::InvalidState.detail(), "no_pkce_session");
        assert_eq!(
            OAuthError::TokenExchangeFailed { status: 400 }.detail(),
            "token_exchange_failed"
        );
        assert_eq!(
            OAuthError::ProfileFetchFailed { status: 401 }.detail(),
            "user_fetch_failed"
        );
        assert_eq!(
            OAuthError::Session(SessionError::NotFound).detail(),
            "server_error"
        );
    }

    #[test]
    fn test_upstream_classification() {
        assert!(OAuthError::ProfileFetchFailed { status: 500 }.is_upstream());
        assert!(!OAuthError::InvalidState.is_upstream());
        assert!(!OAuthError::NotAFollower.is_upstream());
    }
}
