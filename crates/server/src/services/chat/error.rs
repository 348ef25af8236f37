//! Chat workflow error types.

use thiserror::Error;

use chatlink_core::PhoneError;

use crate::db::RepositoryError;

/// Errors that can occur while creating or answering chat requests.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Recipient phone failed validation.
    #[error("invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// No user owns the recipient phone.
    #[error("recipient not found")]
    RecipientNotFound,

    /// No chat with this id.
    #[error("chat not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
