//! Domain models for chatlink.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod chat;
pub mod otp;
pub mod token;
pub mod user;

pub use chat::ChatSession;
pub use otp::{OtpPurpose, OtpRecord};
pub use token::{AuthToken, IssuedToken};
pub use user::{NewUser, PublicUser, User};
