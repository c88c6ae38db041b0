//! HTTP API for the giveaway.
//!
//! # Modules
//!
//! - [`oauth`]: login redirect and provider callback
//! - [`claim`]: code claiming and the "who am I" endpoint
//! - [`middleware`]: session-cookie authentication for protected endpoints
//! - [`cookies`]: session cookie encoding and parsing
//! - [`request_id`]: request correlation ids
//!
//! # Endpoints
//!
//! ```text
//! GET  /login      - 302 to the identity provider (public)
//! GET  /callback   - Provider redirect target; sets the session cookie (public)
//! POST /claim      - Claim a code (session cookie required)
//! GET  /me         - Current user, {"loggedIn": false} without a session (public)
//! GET  /health     - Store reachability and pool size (public)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pc_server::api::{AppState, create_router};
//! # use pc_server::config::WebConfig;
//! # use promo_codes::kv::MemoryKvStore;
//! # use promo_codes::oauth::{HttpIdentityProvider, OAuthClientConfig};
//! # use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let oauth: OAuthClientConfig = unimplemented!();
//! # let web: WebConfig = unimplemented!();
//! # let provider: HttpIdentityProvider = unimplemented!();
//!
//! let state = AppState::new(
//!     Arc::new(MemoryKvStore::new()),
//!     Arc::new(provider),
//!     oauth,
//!     web,
//!     None,
//! );
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:6970").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod claim;
pub mod cookies;
pub mod middleware;
pub mod oauth;
pub mod request_id;

use crate::config::WebConfig;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use cookies::CookiePolicy;
use promo_codes::{
    claims::ClaimAllocator,
    kv::KvStore,
    oauth::{IdentityProvider, LoginFlow, OAuthClientConfig, PendingAuthStore},
    session::SessionStore,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers). Nothing in here is
/// mutable; all shared state lives in the key-value store.
#[derive(Clone)]
pub struct AppState {
    pub login_flow: Arc<LoginFlow>,
    pub sessions: SessionStore,
    pub allocator: ClaimAllocator,
    pub store: Arc<dyn KvStore>,
    pub web: Arc<WebConfig>,
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Wire the library components onto one store
    pub fn new(
        store: Arc<dyn KvStore>,
        provider: Arc<dyn IdentityProvider>,
        oauth: OAuthClientConfig,
        web: WebConfig,
        required_follow_id: Option<String>,
    ) -> Self {
        let sessions = SessionStore::new(store.clone());
        let login_flow = LoginFlow::new(
            oauth,
            PendingAuthStore::new(store.clone()),
            provider,
            sessions.clone(),
        )
        .with_required_follow(required_follow_id);

        let cookies = CookiePolicy {
            max_age: sessions.ttl(),
            http_only: !web.insecure_dev_cookies,
            secure: web.secure_cookies(),
        };

        Self {
            login_flow: Arc::new(login_flow),
            allocator: ClaimAllocator::new(store.clone()),
            sessions,
            store,
            web: Arc::new(web),
            cookies,
        }
    }
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/claim", post(claim::claim))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let cors = cors_layer(state.web.frontend_origin.as_deref());

    Router::new()
        .route("/login", get(oauth::login))
        .route("/callback", get(oauth::callback))
        .route("/me", get(claim::me))
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}

/// Credentialed CORS for a configured frontend, permissive otherwise
fn cors_layer(frontend_origin: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_origin else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!("FRONTEND_ORIGIN is not a valid header value; using permissive CORS");
            CorsLayer::permissive()
        }
    }
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:6970/health
/// # {"status":"healthy","store":true,"codesAvailable":42,"version":"0.1.0","timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.store.ping().await.is_ok();

    let codes_available = if store_healthy {
        state.allocator.pool().available_count().await.ok()
    } else {
        None
    };
    if let Some(count) = codes_available {
        crate::metrics::codes_available(count);
    }

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "codesAvailable": codes_available,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
