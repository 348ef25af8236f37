//! Login tokens.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use chatlink_core::{AuthTokenId, UserId};

/// A stored login token. Only the digest of the token is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub id: AuthTokenId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// `None` for tokens that never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// A freshly issued token. The plaintext is only available here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let mut token = AuthToken {
            id: AuthTokenId::new(1),
            user_id: UserId::new(1),
            created_at: now,
            expires_at: None,
        };
        assert!(!token.is_expired(now));

        token.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(token.is_expired(now));

        token.expires_at = Some(now + chrono::Duration::hours(1));
        assert!(!token.is_expired(now));
    }
}
