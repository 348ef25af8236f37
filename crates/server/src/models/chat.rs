//! Chat introduction requests.

use chrono::{DateTime, Utc};

use chatlink_core::{ChatId, UserId};

/// A request from one user to chat with another.
///
/// `from` and `to` become `None` if the referenced user is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: ChatId,
    /// Initiator.
    pub from: Option<UserId>,
    /// Recipient.
    pub to: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// Set once the recipient authorizes; never cleared.
    pub accepted: bool,
}

impl ChatSession {
    #[must_use]
    pub fn is_recipient(&self, user: UserId) -> bool {
        self.to == Some(user)
    }

    #[must_use]
    pub fn is_initiator(&self, user: UserId) -> bool {
        self.from == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_after_user_deleted() {
        let chat = ChatSession {
            id: ChatId::new(3),
            from: None,
            to: Some(UserId::new(2)),
            created_at: Utc::now(),
            accepted: false,
        };
        assert!(chat.is_recipient(UserId::new(2)));
        assert!(!chat.is_initiator(UserId::new(1)));
        assert!(!chat.is_recipient(UserId::new(1)));
    }
}
