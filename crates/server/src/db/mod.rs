//! Persistence for chatlink.
//!
//! # Schema: `chatlink`
//!
//! ## Tables
//!
//! - `users` - Phone-identified accounts
//! - `phone_otp` - One pending verification code per phone
//! - `chat` - Chat introduction requests
//! - `auth_token` - SHA-256 digests of issued login tokens
//!
//! Each table is reached through a store trait so the workflow services can
//! run against `PostgreSQL` in production and the in-memory stores in
//! [`crate::testing`] under test.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p chatlink-cli -- migrate
//! ```

pub mod chats;
pub mod otp;
pub mod tokens;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use chatlink_core::{AuthTokenId, ChatId, OtpCode, OtpRecordId, PhoneNumber, UserId};

use crate::models::{AuthToken, ChatSession, NewUser, OtpPurpose, OtpRecord, User};

pub use chats::ChatRepository;
pub use otp::OtpRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., phone already registered).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(
    what: &'static str,
) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(what.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// User accounts keyed by phone number.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError>;

    /// Fetch a user together with their password hash.
    async fn get_password_hash(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn get_password_hash_by_id(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    /// Insert a user without any phone verification.
    ///
    /// Returns `Conflict` if the phone is taken.
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Consume the verified registration record for `user.phone` and insert
    /// the user, as one unit.
    ///
    /// Returns `NotFound` if no verified record exists (nothing is written) and
    /// `Conflict` if the phone is taken.
    async fn create_from_verified_otp(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Replace the password hash.
    async fn update_password(&self, id: UserId, password_hash: &str)
    -> Result<(), RepositoryError>;

    /// Consume the verified reset record matching `phone` and `code`, replace
    /// the password hash and reactivate the account, as one unit.
    ///
    /// Returns `NotFound` if no such record or user exists (nothing is written).
    async fn reset_password_from_otp(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;

    /// Apply login bookkeeping: `first_login` becomes true on the very first
    /// login and false on every later one; `last_login` becomes `at`.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<User, RepositoryError>;
}

/// Pending verification codes, one record per phone.
#[async_trait]
pub trait OtpLedger: Send + Sync {
    async fn find(&self, phone: &PhoneNumber) -> Result<Option<OtpRecord>, RepositoryError>;

    /// Claim the next send for `phone` and stage `code` in it.
    ///
    /// The staged record has `send_count = 1` for a new phone; otherwise the
    /// code is replaced, the counter incremented and the verification flag
    /// for `purpose` cleared. Returns `None` when the record already holds
    /// `cap` sends.
    ///
    /// Other reservations for the same phone wait until the returned one is
    /// committed or dropped. Dropping it discards the staged record.
    async fn reserve(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        purpose: OtpPurpose,
        cap: i32,
    ) -> Result<Option<Box<dyn OtpReservation>>, RepositoryError>;

    /// Mark the record verified for `purpose` if it still holds `code`.
    ///
    /// Returns whether a record was updated.
    async fn mark_verified(
        &self,
        id: OtpRecordId,
        code: &OtpCode,
        purpose: OtpPurpose,
    ) -> Result<bool, RepositoryError>;
}

/// A staged OTP send holding the phone's record lock.
#[async_trait]
pub trait OtpReservation: Send {
    /// The record as it will be stored.
    fn record(&self) -> &OtpRecord;

    /// Store the staged record and release the lock.
    async fn commit(self: Box<Self>) -> Result<OtpRecord, RepositoryError>;
}

/// Chat introduction requests.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create(&self, from: UserId, to: UserId) -> Result<ChatSession, RepositoryError>;

    async fn get(&self, id: ChatId) -> Result<Option<ChatSession>, RepositoryError>;

    /// Set `accepted` if `recipient` is the chat's recipient.
    ///
    /// Returns whether the chat matched.
    async fn mark_accepted(&self, id: ChatId, recipient: UserId) -> Result<bool, RepositoryError>;
}

/// Login token digests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create(
        &self,
        user_id: UserId,
        digest: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AuthToken, RepositoryError>;

    async fn find_by_digest(&self, digest: &str) -> Result<Option<AuthToken>, RepositoryError>;

    /// Count tokens of `user_id` that are not expired at `now`.
    async fn count_live(&self, user_id: UserId, now: DateTime<Utc>)
    -> Result<i64, RepositoryError>;

    async fn delete(&self, id: AuthTokenId) -> Result<bool, RepositoryError>;

    /// Delete tokens of `user_id` that expired before `now`.
    async fn delete_expired(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
