//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use promo_codes::{db::DatabaseConfig, oauth::OAuthClientConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_BIND: &str = "127.0.0.1:6970";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:6970";

const DEFAULT_AUTH_URL: &str = "https://twitter.com/i/oauth2/authorize";
const DEFAULT_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const DEFAULT_USER_URL: &str = "https://api.twitter.com/2/users/me";
const DEFAULT_FOLLOWING_URL: &str = "https://api.twitter.com/2/users/{id}/following";
const DEFAULT_SCOPE: &str = "users.read follows.read";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Key-value store backend
    pub store: StoreConfig,
    /// Identity provider settings
    pub oauth: OAuthClientConfig,
    /// Redirect targets and cookie flags
    pub web: WebConfig,
    /// Only followers of this account may log in
    pub required_follow_id: Option<String>,
    /// Deadline for each key-value operation
    pub kv_timeout: Duration,
    /// Deadline for each identity provider call
    pub provider_timeout: Duration,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Codes to load into the pool before serving
    pub seed_file: Option<PathBuf>,
}

/// Key-value store backend selection
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Durable store in PostgreSQL
    Postgres(DatabaseConfig),
    /// Process-local store; state is lost on restart
    Memory,
}

/// Browser-facing settings
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Origin the frontend is served from; redirects are built against it
    pub public_base_url: Url,
    /// Redirect target after a successful login
    pub success_path: String,
    /// Redirect target for login failures
    pub error_path: String,
    /// Drop `HttpOnly` from the session cookie (local development only)
    pub insecure_dev_cookies: bool,
    /// Single origin allowed to call the API with credentials
    pub frontend_origin: Option<String>,
}

impl WebConfig {
    /// Whether cookies should carry `Secure`
    pub fn secure_cookies(&self) -> bool {
        self.public_base_url.scheme() == "https"
    }

    /// Absolute URL on the public origin
    pub fn public_url_for(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.public_base_url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `memory_store` - Use the in-memory store instead of PostgreSQL
    /// * `seed_file` - Optional code file to seed from (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        memory_store: bool,
        seed_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND", DEFAULT_BIND)?,
        };

        let store = if memory_store || parse_env_or("KV_MEMORY", false) {
            StoreConfig::Memory
        } else {
            let mut database = DatabaseConfig::from_env();
            if let Some(url) = database_url_override {
                database.database_url = url;
            }
            StoreConfig::Postgres(database)
        };

        let public_base_url = env_or("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL);
        let public_base_url = Url::parse(&public_base_url).map_err(|e| ConfigError::Invalid {
            var: "PUBLIC_BASE_URL".to_string(),
            reason: e.to_string(),
        })?;

        let client_id = required("OAUTH_CLIENT_ID", "Create an OAuth 2.0 app with the provider")?;
        let redirect_uri = std::env::var("OAUTH_REDIRECT_URI")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{}/callback", public_base_url.as_str().trim_end_matches('/')));

        let oauth = OAuthClientConfig {
            client_id,
            client_secret: optional("OAUTH_CLIENT_SECRET"),
            redirect_uri,
            auth_url: env_or("OAUTH_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: env_or("OAUTH_TOKEN_URL", DEFAULT_TOKEN_URL),
            user_url: env_or("OAUTH_USER_URL", DEFAULT_USER_URL),
            following_url: env_or("OAUTH_FOLLOWING_URL", DEFAULT_FOLLOWING_URL),
            scope: env_or("OAUTH_SCOPE", DEFAULT_SCOPE),
        };

        let web = WebConfig {
            public_base_url,
            success_path: env_or("SUCCESS_PATH", "/"),
            error_path: env_or("ERROR_PATH", "/error"),
            insecure_dev_cookies: parse_env_or("INSECURE_DEV_COOKIES", false),
            frontend_origin: optional("FRONTEND_ORIGIN"),
        };

        let metrics_bind = match optional("METRICS_BIND") {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Not a socket address: {v}"),
            })?),
            None => None,
        };

        Ok(ServerConfig {
            bind,
            store,
            oauth,
            web,
            required_follow_id: optional("REQUIRED_FOLLOW_ID"),
            kv_timeout: Duration::from_millis(parse_env_or("KV_TIMEOUT_MS", 2000)),
            provider_timeout: Duration::from_secs(parse_env_or("PROVIDER_TIMEOUT_SECS", 10)),
            metrics_bind,
            seed_file,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (var, value) in [
            ("OAUTH_AUTH_URL", &self.oauth.auth_url),
            ("OAUTH_TOKEN_URL", &self.oauth.token_url),
            ("OAUTH_USER_URL", &self.oauth.user_url),
            ("OAUTH_REDIRECT_URI", &self.oauth.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| ConfigError::Invalid {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        }

        if self.required_follow_id.is_some() && !self.oauth.following_url.contains("{id}") {
            return Err(ConfigError::Invalid {
                var: "OAUTH_FOLLOWING_URL".to_string(),
                reason: "Must contain the {id} placeholder".to_string(),
            });
        }

        for (var, path) in [
            ("SUCCESS_PATH", &self.web.success_path),
            ("ERROR_PATH", &self.web.error_path),
        ] {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be an absolute path on the public origin".to_string(),
                });
            }
        }

        if self.web.insecure_dev_cookies && self.web.secure_cookies() {
            return Err(ConfigError::Invalid {
                var: "INSECURE_DEV_COOKIES".to_string(),
                reason: "Not allowed when PUBLIC_BASE_URL is https".to_string(),
            });
        }

        if self.kv_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "KV_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.provider_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "PROVIDER_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if let StoreConfig::Postgres(db) = &self.store {
            if db.min_connections > db.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!("Cannot exceed DB_MAX_CONNECTIONS ({})", db.max_connections),
                });
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str, hint: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingRequired {
        var: key.to_string(),
        hint: hint.to_string(),
    })
}

fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env_or(key, default);
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("Not a socket address: {raw}"),
    })
}
