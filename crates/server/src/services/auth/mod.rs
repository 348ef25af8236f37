//! Registration and authentication workflow.
//!
//! Phone ownership is proven with an SMS code before an account is created
//! or a password is reset. Every pending proof lives in the OTP ledger, one
//! record per phone:
//!
//! ```text
//! registration:   issued ──verify──▶ verified ──register──▶ (deleted)
//! password reset: issued ──verify──▶ forgot_verified ──reset──▶ (deleted)
//! ```

mod error;
mod password;

pub use error::AuthError;
pub use password::{MIN_PASSWORD_LENGTH, hash_password, password_matches, validate_password};

use chrono::Utc;
use rand::Rng;

use chatlink_core::{OtpCode, PhoneNumber, UserRole};

use crate::config::OtpPolicy;
use crate::db::{IdentityStore, OtpLedger, RepositoryError};
use crate::models::{IssuedToken, NewUser, OtpPurpose, User};
use crate::services::sms::{self, SmsGateway};
use crate::services::tokens::TokenService;

/// Maximum display name length.
pub const MAX_NAME_LENGTH: usize = 150;

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    /// User after login bookkeeping.
    pub user: User,
    /// Token to hand to the client.
    pub token: IssuedToken,
}

/// Authentication service.
///
/// Handles OTP issuance and verification, registration, login and password
/// changes. Borrowed per request from [`crate::state::AppState`].
pub struct AuthService<'a> {
    users: &'a dyn IdentityStore,
    otps: &'a dyn OtpLedger,
    sms: &'a dyn SmsGateway,
    tokens: TokenService<'a>,
    policy: OtpPolicy,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        users: &'a dyn IdentityStore,
        otps: &'a dyn OtpLedger,
        sms: &'a dyn SmsGateway,
        tokens: TokenService<'a>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            users,
            otps,
            sms,
            tokens,
            policy,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Send a registration code to a phone that has no account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` if the phone is malformed.
    /// Returns `AuthError::AlreadyRegistered` if a user owns the phone.
    /// Returns `AuthError::RateLimited` once the phone has received the
    /// maximum number of codes.
    /// Returns `AuthError::Sms` if delivery fails; nothing is stored then.
    pub async fn request_otp(&self, phone: &str) -> Result<(), AuthError> {
        let phone = PhoneNumber::parse(phone)?;

        if self.users.get_by_phone(&phone).await?.is_some() {
            return Err(AuthError::AlreadyRegistered);
        }

        self.issue_code(
            &phone,
            OtpPurpose::Registration,
            self.policy.max_sends,
            sms::registration_message,
        )
        .await
    }

    /// Confirm a registration code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpNotFound` if no code was issued to the phone.
    /// Returns `AuthError::OtpMismatch` if the code is wrong.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<(), AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let record = self
            .otps
            .find(&phone)
            .await?
            .ok_or(AuthError::OtpNotFound)?;

        if !record.code.matches(code) {
            tracing::info!(phone = %phone, "registration otp mismatch");
            return Err(AuthError::OtpMismatch);
        }

        // A new code may have replaced this one since it was read
        if !self
            .otps
            .mark_verified(record.id, &record.code, OtpPurpose::Registration)
            .await?
        {
            return Err(AuthError::OtpMismatch);
        }

        tracing::info!(phone = %phone, "registration otp verified");
        Ok(())
    }

    /// Create an account for a verified phone.
    ///
    /// The verified record is consumed in the same unit of work that creates
    /// the user, so it can only ever produce one account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::InvalidName` on bad input.
    /// Returns `AuthError::AlreadyRegistered` if a user owns the phone.
    /// Returns `AuthError::OtpNotFound` if no code was issued to the phone.
    /// Returns `AuthError::NotVerified` if the code was never confirmed.
    pub async fn register(
        &self,
        phone: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        validate_password(password)?;
        let name = normalize_name(name)?;

        if self.users.get_by_phone(&phone).await?.is_some() {
            return Err(AuthError::AlreadyRegistered);
        }

        let record = self
            .otps
            .find(&phone)
            .await?
            .ok_or(AuthError::OtpNotFound)?;
        if !record.verified {
            return Err(AuthError::NotVerified);
        }

        let new_user = NewUser {
            phone,
            password_hash: hash_password(password)?,
            name,
            email: None,
            role: UserRole::Standard,
        };

        let user = self
            .users
            .create_from_verified_otp(&new_user)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::AlreadyRegistered,
                RepositoryError::NotFound => AuthError::OtpNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, phone = %user.phone, "user registered");
        Ok(user)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Check credentials and issue a token.
    ///
    /// On the very first login `first_login` becomes true; on every later
    /// login it is false.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone is unknown, the
    /// password is wrong or the account is inactive.
    /// Returns `AuthError::Token` if the user holds too many tokens.
    pub async fn login(&self, phone: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let phone = PhoneNumber::parse(phone).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password_matches(password, &password_hash) || !user.active {
            tracing::info!(phone = %phone, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user).await?;
        let user = self.users.record_login(user.id, Utc::now()).await?;

        tracing::info!(user_id = %user.id, first_login = user.first_login, "user logged in");
        Ok(LoginOutcome { user, token })
    }

    // =========================================================================
    // Password management
    // =========================================================================

    /// Change the password of an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordMismatch` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` is too weak.
    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let password_hash = self
            .users
            .get_password_hash_by_id(user.id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))?;

        if !password_matches(current, &password_hash) {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(new)?;

        self.users
            .update_password(user.id, &hash_password(new)?)
            .await?;

        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Send a password reset code to a registered phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownPhone` if no user owns the phone.
    /// Returns `AuthError::RateLimited` once the phone has received the
    /// maximum number of codes.
    /// Returns `AuthError::Sms` if delivery fails; nothing is stored then.
    pub async fn request_reset_otp(&self, phone: &str) -> Result<(), AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let user = self
            .users
            .get_by_phone(&phone)
            .await?
            .ok_or(AuthError::UnknownPhone)?;

        self.issue_code(
            &phone,
            OtpPurpose::PasswordReset,
            self.policy.max_reset_sends,
            |code| sms::reset_message(user.display_name(), code),
        )
        .await
    }

    /// Confirm a password reset code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpNotFound` if no code was issued to the phone.
    /// Returns `AuthError::NotEligible` if the pending code is not a reset code.
    /// Returns `AuthError::OtpMismatch` if the code is wrong.
    pub async fn verify_reset_otp(&self, phone: &str, code: &str) -> Result<(), AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let record = self
            .otps
            .find(&phone)
            .await?
            .ok_or(AuthError::OtpNotFound)?;

        if !record.forgot {
            return Err(AuthError::NotEligible);
        }
        if !record.code.matches(code) {
            tracing::info!(phone = %phone, "reset otp mismatch");
            return Err(AuthError::OtpMismatch);
        }
        if !self
            .otps
            .mark_verified(record.id, &record.code, OtpPurpose::PasswordReset)
            .await?
        {
            return Err(AuthError::OtpMismatch);
        }

        tracing::info!(phone = %phone, "reset otp verified");
        Ok(())
    }

    /// Set a new password using a verified reset code.
    ///
    /// Reactivates the account and consumes the code in one unit of work.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpNotFound` if no pending record matches both the
    /// phone and the code.
    /// Returns `AuthError::NotVerified` if the reset code was never confirmed.
    /// Returns `AuthError::WeakPassword` if the password is too weak.
    pub async fn complete_reset(
        &self,
        phone: &str,
        code: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let phone = PhoneNumber::parse(phone)?;

        let record = self
            .otps
            .find(&phone)
            .await?
            .filter(|r| r.code.matches(code))
            .ok_or(AuthError::OtpNotFound)?;
        if !record.forgot_verified {
            return Err(AuthError::NotVerified);
        }
        validate_password(password)?;

        let user = self
            .users
            .reset_password_from_otp(&phone, &record.code, &hash_password(password)?)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::OtpNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok(user)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Generate, deliver and record a code.
    ///
    /// The send is claimed in the ledger first and the SMS goes out while
    /// the claim holds the phone's record, so concurrent requests for one
    /// phone are delivered one at a time and never past `cap`. A failed
    /// delivery drops the claim and leaves the ledger untouched.
    async fn issue_code(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
        cap: i32,
        message: impl FnOnce(&OtpCode) -> String + Send,
    ) -> Result<(), AuthError> {
        let code = generate_code(self.policy.code_length);
        let Some(reservation) = self.otps.reserve(phone, &code, purpose, cap).await? else {
            tracing::warn!(phone = %phone, ?purpose, cap, "otp send limit reached");
            return Err(AuthError::RateLimited);
        };
        tracing::debug!(
            phone = %phone,
            send_count = reservation.record().send_count,
            "otp send claimed"
        );

        self.sms.send(phone, &message(&code)).await.map_err(|e| {
            tracing::error!(phone = %phone, error = %e, "otp delivery failed");
            AuthError::Sms(e)
        })?;

        let record = reservation.commit().await?;

        tracing::info!(
            phone = %phone,
            ?purpose,
            send_count = record.send_count,
            "otp issued"
        );
        Ok(())
    }
}

/// Generate a random numeric code.
fn generate_code(length: usize) -> OtpCode {
    let mut rng = rand::rng();
    OtpCode::generate_with(length, || rng.random_range(0..10))
}

/// Trim the display name and drop it if empty.
fn normalize_name(name: Option<&str>) -> Result<Option<String>, AuthError> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(Some(name.to_owned()))
}
