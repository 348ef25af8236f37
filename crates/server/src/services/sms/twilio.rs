//! Twilio Messages API client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use chatlink_core::PhoneNumber;

use super::{SmsError, SmsGateway};
use crate::config::TwilioConfig;

/// Twilio REST API base URL.
const BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Error body returned by Twilio on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: String,
}

/// Subset of the message resource returned on success.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: String,
}

/// Twilio SMS client.
#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
}

impl TwilioClient {
    /// Create a new Twilio client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &TwilioConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SmsError::Config(e.to_string()))?;

        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            base_url: BASE_URL.to_owned(),
        })
    }

    /// Point the client at a different API host.
    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl SmsGateway for TwilioClient {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError> {
        let form = [
            ("To", to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorBody>(&text).map_or(text, |err| {
                match err.code {
                    Some(code) => format!("{} (code {code})", err.message),
                    None => err.message,
                }
            });
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        match response.json::<MessageResource>().await {
            Ok(message) => {
                tracing::info!(
                    phone = %to,
                    sid = %message.sid,
                    status = %message.status,
                    "SMS queued"
                );
            }
            Err(e) => {
                // Delivery was accepted; only the receipt is unreadable
                tracing::warn!(phone = %to, error = %e, "SMS accepted but response unparseable");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token"),
            from_number: "+15550000000".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_messages_url() {
        let client = TwilioClient::new(&config()).unwrap();
        assert_eq!(
            client.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );

        let client = client.with_base_url("http://localhost:4010/");
        assert_eq!(
            client.messages_url(),
            "http://localhost:4010/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let client = TwilioClient::new(&config())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let phone = PhoneNumber::parse("+15551230001").unwrap();

        let err = client.send(&phone, "hello").await.unwrap_err();
        assert!(matches!(err, SmsError::Http(_)));
    }
}
