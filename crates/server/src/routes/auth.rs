//! Registration and session route handlers.
//!
//! Registration is three calls: request a code, confirm it, then create the
//! account. Login returns a token that authenticates every later call.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatusBody, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::PublicUser;
use crate::routes::extract::ApiJson;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Body of the code request endpoints.
#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

/// Body of the code confirmation endpoints.
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// `None` when tokens never expire.
    pub expiry: Option<DateTime<Utc>>,
    pub user_name: String,
    pub user: PublicUser,
}

// =============================================================================
// Registration
// =============================================================================

/// Send a registration code to an unregistered phone.
pub async fn validate_phone(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PhoneRequest>,
) -> Result<StatusBody> {
    state.auth().request_otp(&body.phone).await?;
    Ok(StatusBody::ok("Verification code sent"))
}

/// Confirm a registration code.
pub async fn validate_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OtpRequest>,
) -> Result<StatusBody> {
    state.auth().verify_otp(&body.phone, &body.otp).await?;
    Ok(StatusBody::ok("Phone number verified"))
}

/// Create the account for a verified phone.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, StatusBody)> {
    state
        .auth()
        .register(&body.phone, &body.password, body.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, StatusBody::ok("Account created")))
}

// =============================================================================
// Session
// =============================================================================

/// Exchange phone and password for a token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let outcome = state.auth().login(&body.phone, &body.password).await?;
    set_sentry_user(&outcome.user.id);

    Ok(Json(LoginResponse {
        token: outcome.token.token.expose_secret().to_owned(),
        expiry: outcome.token.expires_at,
        user_name: outcome.user.display_name().to_owned(),
        user: PublicUser::from(&outcome.user),
    }))
}

/// Revoke the token used for this request.
pub async fn logout(State(state): State<AppState>, auth: RequireAuth) -> Result<StatusCode> {
    state.tokens().revoke(&auth.token).await?;
    clear_sentry_user();
    tracing::info!(user_id = %auth.user.id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every token of the caller.
pub async fn logout_all(State(state): State<AppState>, auth: RequireAuth) -> Result<StatusCode> {
    state.tokens().revoke_all(auth.user.id).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's profile.
pub async fn current_user(RequireAuth { user, .. }: RequireAuth) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}
