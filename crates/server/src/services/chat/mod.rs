//! Chat introduction requests.
//!
//! One user asks to chat with another by phone number. Only the recipient
//! can accept; only the initiator learns that the request was accepted.
//! There is no reject path and acceptance is never withdrawn.

mod error;

pub use error::ChatError;

use chatlink_core::{ChatId, PhoneNumber};

use crate::db::{ChatStore, IdentityStore};
use crate::models::{ChatSession, User};

/// A newly created chat request and its recipient.
#[derive(Debug, Clone)]
pub struct CreatedChat {
    pub chat: ChatSession,
    pub recipient: User,
}

/// What the initiator sees when asking whether a request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    /// The recipient accepted.
    Approved,
    /// The recipient has not accepted yet.
    Pending,
    /// The caller did not start this chat.
    NotInitiator,
}

/// Chat workflow service.
pub struct ChatService<'a> {
    chats: &'a dyn ChatStore,
    users: &'a dyn IdentityStore,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(chats: &'a dyn ChatStore, users: &'a dyn IdentityStore) -> Self {
        Self { chats, users }
    }

    /// Ask the owner of `recipient_phone` to chat with `initiator`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidPhone` if the phone is malformed.
    /// Returns `ChatError::RecipientNotFound` if no user owns the phone.
    pub async fn create_chat(
        &self,
        initiator: &User,
        recipient_phone: &str,
    ) -> Result<CreatedChat, ChatError> {
        let phone = PhoneNumber::parse(recipient_phone)?;
        let recipient = self
            .users
            .get_by_phone(&phone)
            .await?
            .ok_or(ChatError::RecipientNotFound)?;

        let chat = self.chats.create(initiator.id, recipient.id).await?;

        tracing::info!(
            chat_id = %chat.id,
            from = %initiator.id,
            to = %recipient.id,
            "chat requested"
        );
        Ok(CreatedChat { chat, recipient })
    }

    /// Whether `caller` is the recipient of the chat.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotFound` if the chat does not exist.
    pub async fn validate_chat(&self, caller: &User, id: ChatId) -> Result<bool, ChatError> {
        let chat = self.load(id).await?;
        Ok(chat.is_recipient(caller.id))
    }

    /// Accept the chat on behalf of its recipient.
    ///
    /// Returns `false` without changing anything if `caller` is not the
    /// recipient. Accepting twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotFound` if the chat does not exist.
    pub async fn authorize_chat(&self, caller: &User, id: ChatId) -> Result<bool, ChatError> {
        let chat = self.load(id).await?;
        if !chat.is_recipient(caller.id) {
            tracing::info!(chat_id = %id, user_id = %caller.id, "authorize by non-recipient");
            return Ok(false);
        }

        let accepted = self.chats.mark_accepted(id, caller.id).await?;
        if accepted {
            tracing::info!(chat_id = %id, user_id = %caller.id, "chat accepted");
        }
        Ok(accepted)
    }

    /// Tell the initiator whether the recipient accepted.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotFound` if the chat does not exist.
    pub async fn check_approval(
        &self,
        caller: &User,
        id: ChatId,
    ) -> Result<ApprovalStatus, ChatError> {
        let chat = self.load(id).await?;
        let status = if !chat.is_initiator(caller.id) {
            ApprovalStatus::NotInitiator
        } else if chat.accepted {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Pending
        };
        Ok(status)
    }

    async fn load(&self, id: ChatId) -> Result<ChatSession, ChatError> {
        self.chats.get(id).await?.ok_or(ChatError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        alice: User,
        bob: User,
        carol: User,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let alice = store.insert_user("+15551230001", "Alice").await;
            let bob = store.insert_user("+15551230002", "Bob").await;
            let carol = store.insert_user("+15551230003", "Carol").await;
            Self {
                store,
                alice,
                bob,
                carol,
            }
        }

        fn chats(&self) -> ChatService<'_> {
            ChatService::new(&self.store, &self.store)
        }
    }

    #[tokio::test]
    async fn test_create_chat_returns_recipient() {
        let fx = Fixture::new().await;
        let created = fx
            .chats()
            .create_chat(&fx.alice, "+15551230002")
            .await
            .unwrap();

        assert_eq!(created.recipient.id, fx.bob.id);
        assert_eq!(created.recipient.display_name(), "Bob");
        assert_eq!(created.chat.from, Some(fx.alice.id));
        assert_eq!(created.chat.to, Some(fx.bob.id));
        assert!(!created.chat.accepted);
    }

    #[tokio::test]
    async fn test_create_chat_unknown_recipient() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.chats().create_chat(&fx.alice, "+15559990000").await,
            Err(ChatError::RecipientNotFound)
        ));
        assert!(matches!(
            fx.chats().create_chat(&fx.alice, "not a phone").await,
            Err(ChatError::InvalidPhone(_))
        ));
        assert_eq!(fx.store.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_only_recipient() {
        let fx = Fixture::new().await;
        let chat = fx
            .chats()
            .create_chat(&fx.alice, "+15551230002")
            .await
            .unwrap()
            .chat;

        assert!(fx.chats().validate_chat(&fx.bob, chat.id).await.unwrap());
        assert!(!fx.chats().validate_chat(&fx.alice, chat.id).await.unwrap());
        assert!(!fx.chats().validate_chat(&fx.carol, chat.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_chat() {
        let fx = Fixture::new().await;
        let missing = ChatId::new(9999);
        assert!(matches!(
            fx.chats().validate_chat(&fx.bob, missing).await,
            Err(ChatError::NotFound)
        ));
        assert!(matches!(
            fx.chats().authorize_chat(&fx.bob, missing).await,
            Err(ChatError::NotFound)
        ));
        assert!(matches!(
            fx.chats().check_approval(&fx.alice, missing).await,
            Err(ChatError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_authorize_then_approval() {
        let fx = Fixture::new().await;
        let chat = fx
            .chats()
            .create_chat(&fx.alice, "+15551230002")
            .await
            .unwrap()
            .chat;

        assert!(!fx.chats().authorize_chat(&fx.carol, chat.id).await.unwrap());
        assert!(!fx.chats().authorize_chat(&fx.alice, chat.id).await.unwrap());
        assert_eq!(
            fx.chats().check_approval(&fx.alice, chat.id).await.unwrap(),
            ApprovalStatus::Pending
        );

        assert!(fx.chats().authorize_chat(&fx.bob, chat.id).await.unwrap());
        assert!(fx.chats().authorize_chat(&fx.bob, chat.id).await.unwrap());
        assert_eq!(
            fx.chats().check_approval(&fx.alice, chat.id).await.unwrap(),
            ApprovalStatus::Approved
        );
        assert_eq!(
            fx.chats().check_approval(&fx.bob, chat.id).await.unwrap(),
            ApprovalStatus::NotInitiator
        );
    }

    #[tokio::test]
    async fn test_chat_with_deleted_initiator() {
        let fx = Fixture::new().await;
        let chat = fx
            .chats()
            .create_chat(&fx.alice, "+15551230002")
            .await
            .unwrap()
            .chat;
        fx.chats().authorize_chat(&fx.bob, chat.id).await.unwrap();

        fx.store.remove_user(fx.alice.id);
        assert_eq!(
            fx.chats().check_approval(&fx.alice, chat.id).await.unwrap(),
            ApprovalStatus::NotInitiator
        );
        assert!(fx.chats().validate_chat(&fx.bob, chat.id).await.unwrap());
    }
}
