//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than digits after the optional `+`.
    #[error("phone number must contain only digits after an optional leading '+'")]
    InvalidCharacter,
    /// Too few digits.
    #[error("phone number must have at least {min} digits")]
    TooShort {
        /// Minimum number of digits.
        min: usize,
    },
    /// Too many digits.
    #[error("phone number must have at most {max} digits")]
    TooLong {
        /// Maximum number of digits.
        max: usize,
    },
}

/// A phone number in an E.164-like format.
///
/// Phone numbers are the identity key for users and for pending OTP records,
/// so two numbers are equal only if their textual form is identical.
///
/// ## Constraints
///
/// - Optional leading `+`
/// - 9-14 subscriber digits, optionally preceded by a `1` country prefix
///   (so up to 15 digits in total when the number starts with `1`)
/// - Digits only, no spaces or separators
///
/// ## Examples
///
/// ```
/// use chatlink_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("+15551230001").is_ok());
/// assert!(PhoneNumber::parse("987654321").is_ok());
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("+1 555 123").is_err());
/// assert!(PhoneNumber::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 9;
    /// Maximum number of digits without the `1` prefix.
    pub const MAX_DIGITS: usize = 14;

    /// Parse a `PhoneNumber` from a string.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains non-digit characters
    /// after the optional `+`, or has the wrong number of digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let digits = s.strip_prefix('+').unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::InvalidCharacter);
        }

        let len = digits.len();
        if len < Self::MIN_DIGITS {
            return Err(PhoneError::TooShort {
                min: Self::MIN_DIGITS,
            });
        }

        let max = if digits.starts_with('1') {
            Self::MAX_DIGITS + 1
        } else {
            Self::MAX_DIGITS
        };
        if len > max {
            return Err(PhoneError::TooLong { max });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
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
    fn test_parse_valid_numbers() {
        assert!(PhoneNumber::parse("+15551230001").is_ok());
        assert!(PhoneNumber::parse("15551230001").is_ok());
        assert!(PhoneNumber::parse("987654321").is_ok());
        assert!(PhoneNumber::parse("+56912345678").is_ok());
        assert!(PhoneNumber::parse("+12345678901234").is_ok());
        assert!(PhoneNumber::parse("123456789012345").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let phone = PhoneNumber::parse("  +15551230001 ").unwrap();
        assert_eq!(phone.as_str(), "+15551230001");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(PhoneNumber::parse(""), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_parse_plus_only() {
        assert_eq!(PhoneNumber::parse("+"), Err(PhoneError::InvalidCharacter));
    }

    #[test]
    fn test_parse_invalid_characters() {
        assert_eq!(
            PhoneNumber::parse("+1 555 123 0001"),
            Err(PhoneError::InvalidCharacter)
        );
        assert_eq!(
            PhoneNumber::parse("555-123-0001"),
            Err(PhoneError::InvalidCharacter)
        );
        assert_eq!(
            PhoneNumber::parse("++15551230001"),
            Err(PhoneError::InvalidCharacter)
        );
    }

    #[test]
    fn test_parse_too_short() {
        assert!(matches!(
            PhoneNumber::parse("12345678"),
            Err(PhoneError::TooShort { min: 9 })
        ));
    }

    #[test]
    fn test_parse_too_long() {
        // 15 digits are only allowed with the `1` prefix
        assert!(matches!(
            PhoneNumber::parse("223456789012345"),
            Err(PhoneError::TooLong { max: 14 })
        ));
        assert!(matches!(
            PhoneNumber::parse("1234567890123456"),
            Err(PhoneError::TooLong { max: 15 })
        ));
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let parsed: Result<PhoneNumber, _> = serde_json::from_str("\"not-a-phone\"");
        assert!(parsed.is_err());

        let parsed: PhoneNumber = serde_json::from_str("\"+15551230001\"").unwrap();
        assert_eq!(parsed.as_str(), "+15551230001");
    }

    #[test]
    fn test_display() {
        let phone = PhoneNumber::parse("+15551230001").unwrap();
        assert_eq!(format!("{phone}"), "+15551230001");
    }
}
