//! chatlink core - Shared types library.
//!
//! This crate provides common types used across all chatlink components:
//! - `server` - JSON API for phone registration, login and chat introductions
//! - `cli` - Command-line tools for migrations and user bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, phone numbers, emails, OTP codes and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
