//! OAuth 2.0 Authorization Code + PKCE login.
//!
//! - [`pkce`]: state, verifier and challenge generation
//! - [`pending`]: verifier storage between `/login` and `/callback`
//! - [`client`]: token exchange and profile/relationship lookups
//! - [`flow`]: the login state machine tying them to the session store

pub mod client;
pub mod errors;
pub mod flow;
pub mod models;
pub mod pending;
pub mod pkce;

pub use client::{DEFAULT_PROVIDER_TIMEOUT, HttpIdentityProvider, IdentityProvider};
pub use errors::{OAuthError, OAuthResult};
pub use flow::{LoginFlow, LoginRedirect};
pub use models::{OAuthClientConfig, PendingAuthorization, TokenResponse, UserProfile};
pub use pending::{PENDING_AUTH_TTL, PendingAuthStore};
