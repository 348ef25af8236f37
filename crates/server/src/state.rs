//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::{
    ChatRepository, ChatStore, IdentityStore, OtpLedger, OtpRepository, TokenRepository,
    TokenStore, UserRepository,
};
use crate::services::auth::AuthService;
use crate::services::chat::ChatService;
use crate::services::sms::{self, SmsError, SmsGateway};
use crate::services::tokens::TokenService;

/// The persistence backends used by the services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn IdentityStore>,
    pub otps: Arc<dyn OtpLedger>,
    pub chats: Arc<dyn ChatStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            otps: Arc::new(OtpRepository::new(pool.clone())),
            chats: Arc::new(ChatRepository::new(pool.clone())),
            tokens: Arc::new(TokenRepository::new(pool.clone())),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Services are borrowed from it
/// per request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    stores: Stores,
    sms: Arc<dyn SmsGateway>,
}

impl AppState {
    /// Create application state backed by `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured SMS gateway cannot be built.
    pub fn new(config: ServerConfig, pool: &PgPool) -> Result<Self, SmsError> {
        let sms = sms::gateway_from_config(&config.sms)?;
        Ok(Self::with_stores(config, Stores::postgres(pool), sms))
    }

    /// Create application state from explicit backends.
    #[must_use]
    pub fn with_stores(config: ServerConfig, stores: Stores, sms: Arc<dyn SmsGateway>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                sms,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn users(&self) -> &dyn IdentityStore {
        self.inner.stores.users.as_ref()
    }

    /// Registration, login and password workflows.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        let stores = &self.inner.stores;
        AuthService::new(
            stores.users.as_ref(),
            stores.otps.as_ref(),
            self.inner.sms.as_ref(),
            self.tokens(),
            self.inner.config.otp,
        )
    }

    /// Chat introduction workflows.
    #[must_use]
    pub fn chats(&self) -> ChatService<'_> {
        let stores = &self.inner.stores;
        ChatService::new(stores.chats.as_ref(), stores.users.as_ref())
    }

    /// Token issuance and resolution.
    #[must_use]
    pub fn tokens(&self) -> TokenService<'_> {
        let stores = &self.inner.stores;
        TokenService::new(
            stores.tokens.as_ref(),
            stores.users.as_ref(),
            self.inner.config.tokens,
        )
    }
}
