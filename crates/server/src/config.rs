//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHATLINK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `TWILIO_ACCOUNT_SID` - Twilio account SID (when `SMS_PROVIDER=twilio`)
//! - `TWILIO_AUTH_TOKEN` - Twilio auth token (when `SMS_PROVIDER=twilio`, high entropy)
//! - `TWILIO_FROM_NUMBER` - Sender number registered with Twilio (when `SMS_PROVIDER=twilio`)
//!
//! ## Optional
//! - `CHATLINK_HOST` - Bind address (default: 127.0.0.1)
//! - `CHATLINK_PORT` - Listen port (default: 8000)
//! - `SMS_PROVIDER` - `twilio` or `log` (default: twilio)
//! - `SMS_TIMEOUT_SECS` - Upper bound for one SMS request (default: 10)
//! - `OTP_LENGTH` - Digits per verification code (default: 6)
//! - `OTP_MAX_SENDS` - Codes per phone during registration (default: 7)
//! - `OTP_MAX_RESET_SENDS` - Codes per phone during password reset (default: 10)
//! - `TOKEN_TTL_HOURS` - Login token lifetime, `0` disables expiry (default: 10)
//! - `TOKEN_LIMIT_PER_USER` - Maximum live tokens per user (default: unlimited)
//! - `RATE_LIMIT_ENABLED` - Per-IP limits on unauthenticated endpoints (default: true)
//! - `TRUST_PROXY_HEADERS` - Key rate limits on `CF-Connecting-IP` / `X-Forwarded-For` /
//!   `X-Real-IP`; enable only behind a proxy that overwrites them (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chatlink_core::OtpCode;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Outbound SMS provider
    pub sms: SmsConfig,
    /// Verification code issuance limits
    pub otp: OtpPolicy,
    /// Login token lifetime and limits
    pub tokens: TokenPolicy,
    /// Apply per-IP rate limits to unauthenticated endpoints
    pub rate_limit: bool,
    /// Take the client address from proxy headers instead of the socket peer
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Which SMS gateway to use.
#[derive(Debug, Clone)]
pub enum SmsConfig {
    /// Deliver through the Twilio Messages API.
    Twilio(TwilioConfig),
    /// Only log outgoing messages. Development use.
    Log,
}

/// Twilio credentials.
///
/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID, also the basic-auth username
    pub account_sid: String,
    /// Auth token, the basic-auth password
    pub auth_token: SecretString,
    /// Sender number
    pub from_number: String,
    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Limits on verification code issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    /// Number of digits in a generated code.
    pub code_length: usize,
    /// Maximum codes sent to one phone while registering.
    pub max_sends: i32,
    /// Maximum codes sent to one phone while resetting a password.
    pub max_reset_sends: i32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_length: 6,
            max_sends: 7,
            max_reset_sends: 10,
        }
    }
}

/// Login token lifetime and per-user limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Token lifetime; `None` means tokens never expire.
    pub ttl: Option<chrono::Duration>,
    /// Maximum number of live tokens per user; `None` means unlimited.
    pub limit_per_user: Option<u32>,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(chrono::Duration::hours(10)),
            limit_per_user: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHATLINK_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("CHATLINK_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("CHATLINK_PORT", "8000")?;

        let sms = SmsConfig::from_env()?;
        let otp = OtpPolicy::from_env()?;
        let tokens = TokenPolicy::from_env()?;
        let rate_limit = parse_env_or_default::<bool>("RATE_LIMIT_ENABLED", "true")?;
        let trust_proxy_headers = parse_env_or_default::<bool>("TRUST_PROXY_HEADERS", "false")?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            sms,
            otp,
            tokens,
            rate_limit,
            trust_proxy_headers,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider = get_env_or_default("SMS_PROVIDER", "twilio");
        match provider.to_ascii_lowercase().as_str() {
            "twilio" => Ok(Self::Twilio(TwilioConfig::from_env()?)),
            "log" => Ok(Self::Log),
            other => Err(ConfigError::InvalidEnvVar(
                "SMS_PROVIDER".to_string(),
                format!("unknown provider '{other}' (expected 'twilio' or 'log')"),
            )),
        }
    }
}

impl TwilioConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = parse_env_or_default::<u64>("SMS_TIMEOUT_SECS", "10")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SMS_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            account_sid: get_required_env("TWILIO_ACCOUNT_SID")?,
            auth_token: get_validated_secret("TWILIO_AUTH_TOKEN")?,
            from_number: get_required_env("TWILIO_FROM_NUMBER")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl OtpPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let code_length = parse_env_or_default::<usize>("OTP_LENGTH", "6")?;
        if !(OtpCode::MIN_LENGTH..=OtpCode::MAX_LENGTH).contains(&code_length) {
            return Err(ConfigError::InvalidEnvVar(
                "OTP_LENGTH".to_string(),
                format!(
                    "must be between {} and {}",
                    OtpCode::MIN_LENGTH,
                    OtpCode::MAX_LENGTH
                ),
            ));
        }

        let max_sends = parse_positive("OTP_MAX_SENDS", "7")?;
        let max_reset_sends = parse_positive("OTP_MAX_RESET_SENDS", "10")?;

        Ok(Self {
            code_length,
            max_sends,
            max_reset_sends,
        })
    }
}

impl TokenPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl = token_ttl(parse_env_or_default::<i64>("TOKEN_TTL_HOURS", "10")?)?;

        let limit_per_user = get_optional_env("TOKEN_LIMIT_PER_USER")
            .map(|raw| {
                raw.parse::<u32>().map_err(|e| {
                    ConfigError::InvalidEnvVar("TOKEN_LIMIT_PER_USER".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            ttl,
            limit_per_user,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Longest accepted token lifetime, about 100 years.
const MAX_TOKEN_TTL_HOURS: i64 = 876_000;

/// Token lifetime for `TOKEN_TTL_HOURS`; `0` disables expiry.
fn token_ttl(hours: i64) -> Result<Option<chrono::Duration>, ConfigError> {
    let invalid =
        |reason: String| ConfigError::InvalidEnvVar("TOKEN_TTL_HOURS".to_string(), reason);
    match hours {
        0 => Ok(None),
        h if h < 0 => Err(invalid("must not be negative".to_string())),
        h if h > MAX_TOKEN_TTL_HOURS => {
            Err(invalid(format!("must be at most {MAX_TOKEN_TTL_HOURS}")))
        }
        h => chrono::Duration::try_hours(h)
            .map(Some)
            .ok_or_else(|| invalid("out of range".to_string())),
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a strictly positive counter.
fn parse_positive(key: &str, default: &str) -> Result<i32, ConfigError> {
    let value = parse_env_or_default::<i32>(key, default)?;
    if value < 1 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
