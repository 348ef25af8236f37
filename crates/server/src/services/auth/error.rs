//! Registration and authentication error types.

use thiserror::Error;

use chatlink_core::PhoneError;

use crate::db::RepositoryError;
use crate::services::sms::SmsError;
use crate::services::tokens::TokenError;

/// Errors that can occur during registration, login and password flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Phone number failed validation.
    #[error("invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Display name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A user already exists for this phone.
    #[error("phone already registered")]
    AlreadyRegistered,

    /// No user exists for this phone.
    #[error("phone not registered")]
    UnknownPhone,

    /// No pending verification record for this phone (or phone and code).
    #[error("no pending verification for this phone")]
    OtpNotFound,

    /// Submitted code differs from the stored one.
    #[error("otp mismatch")]
    OtpMismatch,

    /// The pending record has not been verified yet.
    #[error("phone not verified")]
    NotVerified,

    /// The pending record was not issued for a password reset.
    #[error("no password reset was requested for this phone")]
    NotEligible,

    /// The phone has received the maximum number of codes.
    #[error("otp send limit reached")]
    RateLimited,

    /// Wrong phone or password, or inactive account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Current password did not verify during a password change.
    #[error("current password is incorrect")]
    PasswordMismatch,

    /// Token issuance or resolution failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// SMS delivery failed.
    #[error("sms error: {0}")]
    Sms(#[from] SmsError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
