//! Opaque bearer tokens.
//!
//! A token is 32 random bytes, URL-safe base64 encoded, handed to the client
//! once at login. Only its SHA-256 digest is stored, so a database leak does
//! not yield usable tokens.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use thiserror::Error;

use chatlink_core::UserId;

use crate::config::TokenPolicy;
use crate::db::{IdentityStore, RepositoryError, TokenStore};
use crate::models::{AuthToken, IssuedToken, User};

/// Number of random bytes in a token.
const TOKEN_BYTES: usize = 32;

/// Errors that can occur when issuing or resolving tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token missing, unknown, expired, or owned by an inactive user.
    #[error("invalid or expired token")]
    Unauthenticated,

    /// The user already holds the maximum number of live tokens.
    #[error("maximum number of tokens reached for this user")]
    TooManyTokens,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Issues, resolves and revokes login tokens.
pub struct TokenService<'a> {
    tokens: &'a dyn TokenStore,
    users: &'a dyn IdentityStore,
    policy: TokenPolicy,
}

impl<'a> TokenService<'a> {
    #[must_use]
    pub const fn new(
        tokens: &'a dyn TokenStore,
        users: &'a dyn IdentityStore,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            tokens,
            users,
            policy,
        }
    }

    /// Issue a new token for `user`.
    ///
    /// The user's expired tokens are purged first so they do not count
    /// against the per-user limit.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::TooManyTokens` if the per-user limit is reached.
    pub async fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        self.tokens.delete_expired(user.id, now).await?;

        if let Some(limit) = self.policy.limit_per_user {
            let live = self.tokens.count_live(user.id, now).await?;
            if live >= i64::from(limit) {
                tracing::info!(user_id = %user.id, live, limit, "token limit reached");
                return Err(TokenError::TooManyTokens);
            }
        }

        let token = generate_token();
        // Past chrono's range the token never expires
        let expires_at = self.policy.ttl.and_then(|ttl| now.checked_add_signed(ttl));
        self.tokens
            .create(user.id, &digest(&token), expires_at)
            .await?;

        tracing::debug!(user_id = %user.id, ?expires_at, "token issued");
        Ok(IssuedToken {
            token: SecretString::from(token),
            expires_at,
        })
    }

    /// Resolve a presented token to its active owner.
    ///
    /// An expired token is deleted on sight.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Unauthenticated` for unknown or expired tokens and
    /// for tokens of inactive users.
    pub async fn resolve(&self, token: &str) -> Result<(User, AuthToken), TokenError> {
        let stored = self
            .tokens
            .find_by_digest(&digest(token))
            .await?
            .ok_or(TokenError::Unauthenticated)?;

        if stored.is_expired(Utc::now()) {
            self.tokens.delete(stored.id).await?;
            return Err(TokenError::Unauthenticated);
        }

        let user = self
            .users
            .get_by_id(stored.user_id)
            .await?
            .filter(|u| u.active)
            .ok_or(TokenError::Unauthenticated)?;

        Ok((user, stored))
    }

    /// Delete one token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Repository` if the database operation fails.
    pub async fn revoke(&self, token: &AuthToken) -> Result<(), TokenError> {
        self.tokens.delete(token.id).await?;
        Ok(())
    }

    /// Delete every token of a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Repository` if the database operation fails.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<u64, TokenError> {
        let deleted = self.tokens.delete_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, deleted, "all tokens revoked");
        Ok(deleted)
    }
}

/// Generate a new random token.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 digest under which a token is stored.
#[must_use]
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
