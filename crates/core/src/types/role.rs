//! User role.

use serde::{Deserialize, Serialize};

/// Error returned when a role name is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid user role: {0}")]
pub struct UserRoleError(pub String);

/// Account level of a user.
///
/// Stored as two boolean columns (`is_staff`, `is_admin`); admin implies staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular account created through phone registration.
    #[default]
    Standard,
    /// Operator account.
    Staff,
    /// Full administrative access.
    Admin,
}

impl UserRole {
    /// Derive the role from the stored flags.
    #[must_use]
    pub const fn from_flags(is_staff: bool, is_admin: bool) -> Self {
        match (is_staff, is_admin) {
            (_, true) => Self::Admin,
            (true, false) => Self::Staff,
            (false, false) => Self::Standard,
        }
    }

    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = UserRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            _ => Err(UserRoleError(s.to_owned())),
        }
    }
}
