//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! CHATLINK_USER_PASSWORD=... chatlink-cli user create -p +15551230001 -n "Ana" -r admin
//! ```
//!
//! # Environment Variables
//!
//! - `CHATLINK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CHATLINK_USER_PASSWORD` - Initial password, instead of `--password`

use chatlink_core::{Email, EmailError, PhoneError, PhoneNumber, UserRole, UserRoleError};
use chatlink_server::db::{IdentityStore, RepositoryError, UserRepository, create_pool};
use chatlink_server::models::NewUser;
use chatlink_server::services::auth::{AuthError, hash_password, validate_password};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0}. Valid roles: standard, staff, admin")]
    InvalidRole(#[from] UserRoleError),

    /// Password too weak or hashing failed.
    #[error("Password error: {0}")]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with phone: {0}")]
    UserExists(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

/// Create a user directly, without phone verification.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if any input is invalid, the phone is taken, or the
/// database is unreachable.
pub async fn create_user(
    phone: &str,
    name: &str,
    role: &str,
    email: Option<&str>,
    password: &SecretString,
) -> Result<i64, UserError> {
    let phone = PhoneNumber::parse(phone)?;
    let role: UserRole = role.parse()?;
    let email = email.map(Email::parse).transpose()?;
    validate_password(password.expose_secret())?;

    let database_url =
        super::database_url().ok_or(UserError::MissingEnvVar("CHATLINK_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;

    let new_user = NewUser {
        phone: phone.clone(),
        password_hash: hash_password(password.expose_secret())?,
        name: Some(name.trim().to_owned()).filter(|n| !n.is_empty()),
        email,
        role,
    };

    let user = UserRepository::new(pool)
        .create(&new_user)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(phone.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, phone = %user.phone, %role, "User created");
    Ok(user.id.as_i64())
}
