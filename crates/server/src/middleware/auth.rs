//! Authentication extractor.
//!
//! Clients present the token issued at login in the `Authorization` header,
//! as `Token <token>` or `Bearer <token>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::{AuthToken, User};
use crate::services::tokens::TokenError;
use crate::state::AppState;

/// Extractor that requires a valid login token.
///
/// Rejects with 401 if the header is missing or the token is unknown,
/// expired, or belongs to an inactive user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth { user, .. }: RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth {
    pub user: User,
    /// The token used for this request, so it can be revoked on logout.
    pub token: AuthToken,
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = bearer_token(parts).ok_or(TokenError::Unauthenticated)?;
        let (user, token) = state.tokens().resolve(presented).await?;

        set_sentry_user(&user.id);
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        Ok(Self { user, token })
    }
}

/// The token part of the `Authorization` header.
///
/// The scheme word is not checked; the last whitespace-separated part wins.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .next_back()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/user");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_schemes() {
        assert_eq!(bearer_token(&parts(Some("Token abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("abc123"))), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing() {
        assert_eq!(bearer_token(&parts(None)), None);
        assert_eq!(bearer_token(&parts(Some("   "))), None);
    }
}
