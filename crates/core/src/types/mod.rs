//! Core types for chatlink.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod otp;
pub mod phone;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use otp::{OtpCode, OtpCodeError};
pub use phone::{PhoneError, PhoneNumber};
pub use role::{UserRole, UserRoleError};
