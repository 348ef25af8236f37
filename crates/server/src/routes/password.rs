//! Password change and reset route handlers.

use axum::extract::State;
use serde::Deserialize;

use crate::error::{Result, StatusBody};
use crate::middleware::RequireAuth;
use crate::routes::auth::{OtpRequest, PhoneRequest};
use crate::routes::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub password_1: String,
    /// New password.
    pub password_2: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub phone: String,
    pub otp: String,
    pub password: String,
}

/// Change the caller's password.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth { user, .. }: RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusBody> {
    state
        .auth()
        .change_password(&user, &body.password_1, &body.password_2)
        .await?;
    Ok(StatusBody::ok("Password changed"))
}

/// Send a reset code to a registered phone.
pub async fn forgot_validate_phone(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PhoneRequest>,
) -> Result<StatusBody> {
    state.auth().request_reset_otp(&body.phone).await?;
    Ok(StatusBody::ok("Verification code sent"))
}

/// Confirm a reset code.
pub async fn forgot_validate_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OtpRequest>,
) -> Result<StatusBody> {
    state.auth().verify_reset_otp(&body.phone, &body.otp).await?;
    Ok(StatusBody::ok("Phone number verified"))
}

/// Set a new password with a confirmed reset code.
pub async fn forgot_reset(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetRequest>,
) -> Result<StatusBody> {
    state
        .auth()
        .complete_reset(&body.phone, &body.otp, &body.password)
        .await?;
    Ok(StatusBody::ok("Password reset"))
}
