//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. Every error reaches the client as
//! `{"status": false, "detail": "..."}` with a matching HTTP status.
//! All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::chat::ChatError;
use crate::services::tokens::TokenError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Registration, login or password workflow failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat workflow failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Token missing, invalid or over the limit.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// The `{status, detail}` body shared by errors and plain outcomes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusBody {
    pub status: bool,
    pub detail: String,
}

impl StatusBody {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            status: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: false,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for StatusBody {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl AppError {
    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Auth(
                    AuthError::Repository(_)
                        | AuthError::PasswordHash
                        | AuthError::Sms(_)
                        | AuthError::Token(TokenError::Repository(_))
                )
                | Self::Chat(ChatError::Repository(_))
                | Self::Token(TokenError::Repository(_))
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidPhone(_)
                | AuthError::WeakPassword(_)
                | AuthError::InvalidName(_)
                | AuthError::OtpMismatch
                | AuthError::NotVerified
                | AuthError::NotEligible
                | AuthError::PasswordMismatch => StatusCode::BAD_REQUEST,
                AuthError::AlreadyRegistered => StatusCode::CONFLICT,
                AuthError::UnknownPhone | AuthError::OtpNotFound => StatusCode::NOT_FOUND,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::Token(token) => token_status(token),
                AuthError::Sms(_) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Chat(err) => match err {
                ChatError::InvalidPhone(_) => StatusCode::BAD_REQUEST,
                ChatError::RecipientNotFound | ChatError::NotFound => StatusCode::NOT_FOUND,
                ChatError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Token(err) => token_status(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn detail(&self) -> String {
        // Don't expose internal error details to clients
        if self.is_server_error() {
            return match self {
                Self::Auth(AuthError::Sms(_)) => "Could not send the verification code".to_string(),
                _ => "Internal server error".to_string(),
            };
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidPhone(e) => format!("Invalid phone number: {e}"),
                AuthError::WeakPassword(msg) | AuthError::InvalidName(msg) => msg.clone(),
                AuthError::AlreadyRegistered => {
                    "An account with this phone number already exists".to_string()
                }
                AuthError::UnknownPhone => "No account exists for this phone number".to_string(),
                AuthError::OtpNotFound => {
                    "No verification code was requested for this phone number".to_string()
                }
                AuthError::OtpMismatch => "The verification code is incorrect".to_string(),
                AuthError::NotVerified => "The phone number has not been verified".to_string(),
                AuthError::NotEligible => {
                    "No password reset was requested for this phone number".to_string()
                }
                AuthError::RateLimited => {
                    "Too many verification codes sent to this phone number".to_string()
                }
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::PasswordMismatch => "The current password is incorrect".to_string(),
                AuthError::Token(token) => token_detail(token),
                _ => "Authentication error".to_string(),
            },
            Self::Chat(err) => match err {
                ChatError::InvalidPhone(e) => format!("Invalid phone number: {e}"),
                ChatError::RecipientNotFound => {
                    "No user exists for this phone number".to_string()
                }
                ChatError::NotFound => "Chat not found".to_string(),
                ChatError::Repository(_) => "Internal server error".to_string(),
            },
            Self::Token(err) => token_detail(err),
            Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) => "Internal server error".to_string(),
        }
    }
}

const fn token_status(err: &TokenError) -> StatusCode {
    match err {
        TokenError::Unauthenticated => StatusCode::UNAUTHORIZED,
        TokenError::TooManyTokens => StatusCode::FORBIDDEN,
        TokenError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn token_detail(err: &TokenError) -> String {
    match err {
        TokenError::Unauthenticated => "Invalid or expired token".to_string(),
        TokenError::TooManyTokens => "Maximum number of active sessions reached".to_string(),
        TokenError::Repository(_) => "Internal server error".to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status_code(), StatusBody::fail(self.detail())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::services::sms::SmsError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            get_status(AuthError::AlreadyRegistered.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::OtpNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::OtpMismatch.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::RateLimited.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Token(TokenError::TooManyTokens).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(
                AuthError::Sms(SmsError::Api {
                    status: 500,
                    message: "down".into()
                })
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_chat_and_token_status_codes() {
        assert_eq!(
            get_status(ChatError::RecipientNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(TokenError::Unauthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::from(AuthError::OtpMismatch).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["detail"], "The verification code is incorrect");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = AppError::from(RepositoryError::DataCorruption(
            "connection string leaked".into(),
        ))
        .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Internal server error");
    }
}
