//! chatlink API library.
//!
//! Phone-number accounts verified by SMS, token login, and chat
//! introductions between users. The binary in `main.rs` wires this library
//! to `PostgreSQL`, Twilio and Sentry; tests drive [`routes::app`] directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
