//! Pending phone verification records.

use chrono::{DateTime, Utc};

use chatlink_core::{OtpCode, OtpRecordId, PhoneNumber};

/// Why a verification code was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    /// Proving ownership of a phone before creating an account.
    Registration,
    /// Proving ownership of a phone before resetting a password.
    PasswordReset,
}

/// One pending verification per phone.
///
/// State moves one way: issued, then verified (for the record's purpose),
/// then consumed, which deletes the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub id: OtpRecordId,
    pub phone: PhoneNumber,
    /// Most recently issued code.
    pub code: OtpCode,
    /// Codes sent to this phone since the record was created.
    pub send_count: i32,
    /// Registration code was confirmed.
    pub verified: bool,
    /// A password-reset code has been issued.
    pub forgot: bool,
    /// Password-reset code was confirmed.
    pub forgot_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
