//! Business logic services for chatlink.
//!
//! # Services
//!
//! - `auth` - Phone verification, registration, login and password flows
//! - `chat` - Chat introduction requests between users
//! - `sms` - Outbound SMS delivery
//! - `tokens` - Opaque login tokens
//!
//! Services borrow their stores from [`crate::state::AppState`] and are
//! constructed per request.

pub mod auth;
pub mod chat;
pub mod sms;
pub mod tokens;

pub use auth::{AuthError, AuthService, LoginOutcome};
pub use chat::{ApprovalStatus, ChatError, ChatService, CreatedChat};
pub use sms::{SmsError, SmsGateway};
pub use tokens::{TokenError, TokenService};
