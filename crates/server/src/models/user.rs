//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use chatlink_core::{Email, PhoneNumber, UserId, UserRole};

/// A registered user (domain type).
///
/// The password hash is deliberately absent; it is only read through
/// [`crate::db::IdentityStore::get_password_hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Phone number, unique across all users.
    pub phone: PhoneNumber,
    /// Display name chosen at registration.
    pub name: Option<String>,
    /// Optional contact email.
    pub email: Option<Email>,
    /// Account level.
    pub role: UserRole,
    /// Inactive accounts cannot log in or use tokens.
    pub active: bool,
    /// True right after the first successful login.
    pub first_login: bool,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to other users, falling back to the phone number.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.phone.as_str())
    }
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: PhoneNumber,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub name: Option<String>,
    pub email: Option<Email>,
    pub role: UserRole,
}

/// The profile returned to the authenticated user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: UserId,
    pub phone: PhoneNumber,
    pub name: Option<String>,
    pub email: Option<Email>,
    pub first_login: bool,
    pub role: UserRole,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            first_login: user.first_login,
            role: user.role,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> User {
        User {
            id: UserId::new(1),
            phone: PhoneNumber::parse("+15551230001").unwrap(),
            name: name.map(String::from),
            email: None,
            role: UserRole::Standard,
            active: true,
            first_login: false,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_phone() {
        assert_eq!(user(Some("Ana")).display_name(), "Ana");
        assert_eq!(user(None).display_name(), "+15551230001");
        assert_eq!(user(Some("  ")).display_name(), "+15551230001");
    }
}
