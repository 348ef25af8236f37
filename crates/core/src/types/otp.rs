//! One-time password codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OtpCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeError {
    /// The code has the wrong number of digits.
    #[error("otp must have between {min} and {max} digits")]
    Length {
        /// Minimum number of digits.
        min: usize,
        /// Maximum number of digits.
        max: usize,
    },
    /// The code contains a non-digit character.
    #[error("otp must contain only digits")]
    NotNumeric,
}

/// A short numeric code delivered by SMS.
///
/// The `Debug` impl redacts the digits so codes do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    /// Shortest accepted code.
    pub const MIN_LENGTH: usize = 4;
    /// Longest accepted code.
    pub const MAX_LENGTH: usize = 9;

    /// Parse a code submitted by a client or read back from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not 4-9 ASCII digits.
    pub fn parse(s: &str) -> Result<Self, OtpCodeError> {
        let s = s.trim();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(OtpCodeError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpCodeError::NotNumeric);
        }
        Ok(Self(s.to_owned()))
    }

    /// Build a code of `length` digits from a digit source.
    ///
    /// `next_digit` is called once per position; values are reduced modulo 10.
    /// The length is clamped to the accepted range.
    #[must_use]
    pub fn generate_with(length: usize, mut next_digit: impl FnMut() -> u8) -> Self {
        let length = length.clamp(Self::MIN_LENGTH, Self::MAX_LENGTH);
        let code = (0..length)
            .map(|_| char::from(b'0' + next_digit() % 10))
            .collect();
        Self(code)
    }

    /// Returns the digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against a submitted code.
    #[must_use]
    pub fn matches(&self, submitted: &str) -> bool {
        self.0 == submitted
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode([REDACTED])")
    }
}

impl TryFrom<String> for OtpCode {
    type Error = OtpCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OtpCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OtpCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OtpCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(OtpCode::parse("1234").is_ok());
        assert!(OtpCode::parse("123456789").is_ok());
        assert!(matches!(
            OtpCode::parse("123"),
            Err(OtpCodeError::Length { .. })
        ));
        assert!(matches!(
            OtpCode::parse("1234567890"),
            Err(OtpCodeError::Length { .. })
        ));
        assert_eq!(OtpCode::parse("12a4"), Err(OtpCodeError::NotNumeric));
    }

    #[test]
    fn test_generate_with_reduces_digits() {
        let mut values = [3_u8, 14, 25, 9, 0, 255].into_iter();
        let code = OtpCode::generate_with(6, || values.next().unwrap_or(0));
        assert_eq!(code.as_str(), "345905");
    }

    #[test]
    fn test_generate_with_clamps_length() {
        assert_eq!(OtpCode::generate_with(1, || 7).as_str(), "7777");
        assert_eq!(OtpCode::generate_with(20, || 1).as_str().len(), 9);
    }

    #[test]
    fn test_matches_is_exact() {
        let code = OtpCode::parse("004211").unwrap();
        assert!(code.matches("004211"));
        assert!(!code.matches(" 004211 "));
        assert!(!code.matches("4211"));
        assert!(!code.matches("004212"));
    }

    #[test]
    fn test_debug_redacts() {
        let code = OtpCode::parse("987654").unwrap();
        assert!(!format!("{code:?}").contains("987654"));
    }
}
