//! Outbound SMS delivery.
//!
//! - [`TwilioClient`] posts to the Twilio Messages API.
//! - [`LogSmsGateway`] only logs the message, for local development.
//!
//! Sends are never retried; a failure is reported to the caller.

mod twilio;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use chatlink_core::{OtpCode, PhoneNumber};

use crate::config::SmsConfig;

pub use twilio::TwilioClient;

/// Errors that can occur when sending an SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the message.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Gateway could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Something that can deliver a text message to a phone.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Deliver `body` to `to`.
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError>;
}

/// Gateway that logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError> {
        tracing::warn!(phone = %to, body, "SMS_PROVIDER=log, message not delivered");
        Ok(())
    }
}

/// Build the gateway selected by configuration.
///
/// # Errors
///
/// Returns `SmsError::Config` if the HTTP client cannot be built.
pub fn gateway_from_config(config: &SmsConfig) -> Result<Arc<dyn SmsGateway>, SmsError> {
    match config {
        SmsConfig::Twilio(twilio) => Ok(Arc::new(TwilioClient::new(twilio)?)),
        SmsConfig::Log => Ok(Arc::new(LogSmsGateway)),
    }
}

/// Text sent with a registration code.
#[must_use]
pub fn registration_message(code: &OtpCode) -> String {
    format!("Your verification code is: {}.", code.as_str())
}

/// Text sent with a password reset code, greeting the user by name.
#[must_use]
pub fn reset_message(name: &str, code: &OtpCode) -> String {
    format!("Hello {name}, your verification code is: {}.", code.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_contain_code() {
        let code = OtpCode::parse("482913").unwrap();
        assert_eq!(
            registration_message(&code),
            "Your verification code is: 482913."
        );
        assert_eq!(
            reset_message("Ana", &code),
            "Hello Ana, your verification code is: 482913."
        );
    }

    #[tokio::test]
    async fn test_log_gateway_always_succeeds() {
        let phone = PhoneNumber::parse("+15551230001").unwrap();
        assert!(LogSmsGateway.send(&phone, "hi").await.is_ok());
    }
}
