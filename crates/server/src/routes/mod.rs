//! HTTP route handlers for chatlink.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness probe
//! GET  /health/ready               - Readiness probe (database)
//!
//! # Registration (rate limited per IP)
//! POST /api/validate_phone         - Send registration code
//! POST /api/validate_otp           - Confirm registration code
//! POST /api/register               - Create account
//! POST /api/login                  - Issue token
//!
//! # Password reset (rate limited per IP)
//! POST /api/forgot/validate_phone  - Send reset code
//! POST /api/forgot/validate_otp    - Confirm reset code
//! POST /api/forgot/reset           - Set new password
//!
//! # Session (requires auth)
//! GET  /api/user                   - Caller profile
//! POST /api/logout                 - Revoke this token
//! POST /api/logoutall              - Revoke all tokens
//! POST /api/change_password        - Change password
//!
//! # Chat (requires auth)
//! POST /api/chat/create            - Ask a user to chat
//! POST /api/chat/validate          - Is the caller the recipient?
//! POST /api/chat/authorize         - Recipient accepts
//! POST /api/chat/approval          - Did the recipient accept?
//! ```

pub mod auth;
pub mod chat;
pub mod extract;
pub mod health;
pub mod password;

use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::middleware::{
    ClientIpKeyExtractor, api_rate_limiter, auth_rate_limiter, request_id_middleware,
};
use crate::state::AppState;

/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/validate_phone", post(auth::validate_phone))
        .route("/validate_otp", post(auth::validate_otp))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot/validate_phone", post(password::forgot_validate_phone))
        .route("/forgot/validate_otp", post(password::forgot_validate_otp))
        .route("/forgot/reset", post(password::forgot_reset))
}

/// Endpoints that require a token.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(auth::current_user))
        .route("/logout", post(auth::logout))
        .route("/logoutall", post(auth::logout_all))
        .route("/change_password", post(password::change_password))
        .route("/chat/create", post(chat::create))
        .route("/chat/validate", post(chat::validate))
        .route("/chat/authorize", post(chat::authorize))
        .route("/chat/approval", post(chat::approval))
}

/// Create all API routes, applying per-IP rate limits when enabled.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    let public = public_routes();
    let authenticated = authenticated_routes();

    if config.rate_limit {
        let key = ClientIpKeyExtractor::new(config.trust_proxy_headers);
        public
            .layer(auth_rate_limiter(key))
            .merge(authenticated.layer(api_rate_limiter(key)))
    } else {
        public.merge(authenticated)
    }
}

/// Build the complete application router.
///
/// Sentry layers are added by the binary so tests can drive this router
/// directly.
pub fn app(state: AppState) -> Router {
    let api = api_routes(state.config());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
