//! In-memory backends for tests.
//!
//! [`MemoryStore`] implements every store trait over one mutex-guarded set
//! of tables with the same conditional semantics as the `PostgreSQL`
//! repositories. [`RecordingSmsGateway`] keeps every message instead of
//! sending it.
//!
//! Enabled for unit tests and, through the `testing` feature, for the
//! integration test crate.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::OwnedMutexGuard;

use chatlink_core::{AuthTokenId, ChatId, OtpCode, OtpRecordId, PhoneNumber, UserId, UserRole};

use crate::config::{OtpPolicy, ServerConfig, SmsConfig, TokenPolicy};
use crate::db::{ChatStore, IdentityStore, OtpLedger, OtpReservation, RepositoryError, TokenStore};
use crate::models::{AuthToken, ChatSession, NewUser, OtpPurpose, OtpRecord, User};
use crate::services::auth::hash_password;
use crate::services::sms::{SmsError, SmsGateway};
use crate::state::{AppState, Stores};

/// Password of every user created by [`MemoryStore::insert_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

struct StoredUser {
    user: User,
    password_hash: String,
}

struct StoredToken {
    token: AuthToken,
    digest: String,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<StoredUser>,
    otps: Vec<OtpRecord>,
    chats: Vec<ChatSession>,
    tokens: Vec<StoredToken>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut StoredUser> {
        self.users.iter_mut().find(|u| u.user.id == id)
    }

    fn insert_user(&mut self, new: &NewUser) -> Result<User, RepositoryError> {
        if self.users.iter().any(|u| u.user.phone == new.phone) {
            return Err(RepositoryError::Conflict("phone already registered".into()));
        }
        let user = User {
            id: UserId::new(self.next_id()),
            phone: new.phone.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            role: new.role,
            active: true,
            first_login: false,
            last_login: None,
            created_at: Utc::now(),
        };
        self.users.push(StoredUser {
            user: user.clone(),
            password_hash: new.password_hash.clone(),
        });
        Ok(user)
    }
}

/// In-memory implementation of all store traits.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    /// Per-phone locks standing in for `PostgreSQL` row locks.
    otp_locks: Arc<Mutex<HashMap<PhoneNumber, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_phone(&self, phone: &PhoneNumber) -> OwnedMutexGuard<()> {
        let row_lock = self
            .otp_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(phone.clone())
            .or_default()
            .clone();
        row_lock.lock_owned().await
    }

    /// Create an active standard user whose password is [`TEST_PASSWORD`].
    pub async fn insert_user(&self, phone: &str, name: &str) -> User {
        let new_user = NewUser {
            phone: PhoneNumber::parse(phone).expect("test phone must be valid"),
            password_hash: hash_password(TEST_PASSWORD).expect("hashing must succeed"),
            name: Some(name.to_owned()),
            email: None,
            role: UserRole::Standard,
        };
        IdentityStore::create(self, &new_user)
            .await
            .expect("test user must be unique")
    }

    /// Flip the `active` flag of a user.
    pub fn set_active(&self, id: UserId, active: bool) {
        if let Some(stored) = self.lock().user_mut(id) {
            stored.user.active = active;
        }
    }

    /// Delete a user the way the database would: chats keep a dangling
    /// `None` reference and tokens are removed.
    pub fn remove_user(&self, id: UserId) {
        let mut tables = self.lock();
        tables.users.retain(|u| u.user.id != id);
        tables.tokens.retain(|t| t.token.user_id != id);
        for chat in &mut tables.chats {
            if chat.from == Some(id) {
                chat.from = None;
            }
            if chat.to == Some(id) {
                chat.to = None;
            }
        }
    }

    /// Number of stored tokens across all users.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.lock().tokens.len()
    }

    /// Number of stored chats.
    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.lock().chats.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| &u.user.phone == phone)
            .map(|u| u.user.clone()))
    }

    async fn get_password_hash(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| &u.user.phone == phone)
            .map(|u| (u.user.clone(), u.password_hash.clone())))
    }

    async fn get_password_hash_by_id(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.password_hash.clone()))
    }

    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        self.lock().insert_user(user)
    }

    async fn create_from_verified_otp(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.lock();
        let position = tables
            .otps
            .iter()
            .position(|r| r.phone == user.phone && r.verified)
            .ok_or(RepositoryError::NotFound)?;

        let created = tables.insert_user(user)?;
        tables.otps.remove(position);
        Ok(created)
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        let stored = tables.user_mut(id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(&mut stored.password_hash);
        Ok(())
    }

    async fn reset_password_from_otp(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut guard = self.lock();
        let tables = &mut *guard;
        let position = tables
            .otps
            .iter()
            .position(|r| &r.phone == phone && &r.code == code && r.forgot_verified)
            .ok_or(RepositoryError::NotFound)?;
        let stored = tables
            .users
            .iter_mut()
            .find(|u| &u.user.phone == phone)
            .ok_or(RepositoryError::NotFound)?;

        password_hash.clone_into(&mut stored.password_hash);
        stored.user.active = true;
        let user = stored.user.clone();
        tables.otps.remove(position);
        Ok(user)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<User, RepositoryError> {
        let mut tables = self.lock();
        let stored = tables.user_mut(id).ok_or(RepositoryError::NotFound)?;
        stored.user.first_login = stored.user.last_login.is_none();
        stored.user.last_login = Some(at);
        Ok(stored.user.clone())
    }
}

#[async_trait]
impl OtpLedger for MemoryStore {
    async fn find(&self, phone: &PhoneNumber) -> Result<Option<OtpRecord>, RepositoryError> {
        Ok(self.lock().otps.iter().find(|r| &r.phone == phone).cloned())
    }

    async fn reserve(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        purpose: OtpPurpose,
        cap: i32,
    ) -> Result<Option<Box<dyn OtpReservation>>, RepositoryError> {
        let guard = self.lock_phone(phone).await;
        let mut tables = self.lock();
        let now = Utc::now();

        let existing = tables.otps.iter().find(|r| &r.phone == phone).cloned();
        let record = match existing {
            Some(existing) if existing.send_count >= cap => return Ok(None),
            Some(mut record) => {
                record.code = code.clone();
                record.send_count += 1;
                match purpose {
                    OtpPurpose::Registration => record.verified = false,
                    OtpPurpose::PasswordReset => {
                        record.forgot = true;
                        record.forgot_verified = false;
                    }
                }
                record.updated_at = now;
                record
            }
            None => OtpRecord {
                id: OtpRecordId::new(tables.next_id()),
                phone: phone.clone(),
                code: code.clone(),
                send_count: 1,
                verified: false,
                forgot: purpose == OtpPurpose::PasswordReset,
                forgot_verified: false,
                created_at: now,
                updated_at: now,
            },
        };

        Ok(Some(Box::new(MemoryReservation {
            store: self.clone(),
            record,
            _guard: guard,
        })))
    }

    async fn mark_verified(
        &self,
        id: OtpRecordId,
        code: &OtpCode,
        purpose: OtpPurpose,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let Some(record) = tables
            .otps
            .iter_mut()
            .find(|r| r.id == id && &r.code == code)
        else {
            return Ok(false);
        };

        match purpose {
            OtpPurpose::Registration => record.verified = true,
            OtpPurpose::PasswordReset if record.forgot => record.forgot_verified = true,
            OtpPurpose::PasswordReset => return Ok(false),
        }
        record.updated_at = Utc::now();
        Ok(true)
    }
}

struct MemoryReservation {
    store: MemoryStore,
    record: OtpRecord,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl OtpReservation for MemoryReservation {
    fn record(&self) -> &OtpRecord {
        &self.record
    }

    async fn commit(self: Box<Self>) -> Result<OtpRecord, RepositoryError> {
        let mut tables = self.store.lock();
        match tables.otps.iter_mut().find(|r| r.phone == self.record.phone) {
            Some(stored) => *stored = self.record.clone(),
            None => tables.otps.push(self.record.clone()),
        }
        Ok(self.record.clone())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create(&self, from: UserId, to: UserId) -> Result<ChatSession, RepositoryError> {
        let mut tables = self.lock();
        let chat = ChatSession {
            id: ChatId::new(tables.next_id()),
            from: Some(from),
            to: Some(to),
            created_at: Utc::now(),
            accepted: false,
        };
        tables.chats.push(chat.clone());
        Ok(chat)
    }

    async fn get(&self, id: ChatId) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self.lock().chats.iter().find(|c| c.id == id).cloned())
    }

    async fn mark_accepted(&self, id: ChatId, recipient: UserId) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let Some(chat) = tables
            .chats
            .iter_mut()
            .find(|c| c.id == id && c.to == Some(recipient))
        else {
            return Ok(false);
        };
        chat.accepted = true;
        Ok(true)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create(
        &self,
        user_id: UserId,
        digest: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AuthToken, RepositoryError> {
        let mut tables = self.lock();
        if tables.tokens.iter().any(|t| t.digest == digest) {
            return Err(RepositoryError::Conflict("token digest collision".into()));
        }
        let token = AuthToken {
            id: AuthTokenId::new(tables.next_id()),
            user_id,
            created_at: Utc::now(),
            expires_at,
        };
        tables.tokens.push(StoredToken {
            token: token.clone(),
            digest: digest.to_owned(),
        });
        Ok(token)
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<AuthToken>, RepositoryError> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .find(|t| t.digest == digest)
            .map(|t| t.token.clone()))
    }

    async fn count_live(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let live = self
            .lock()
            .tokens
            .iter()
            .filter(|t| t.token.user_id == user_id && !t.token.is_expired(now))
            .count();
        Ok(i64::try_from(live).unwrap_or(i64::MAX))
    }

    async fn delete(&self, id: AuthTokenId) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.tokens.len();
        tables.tokens.retain(|t| t.token.id != id);
        Ok(tables.tokens.len() < before)
    }

    async fn delete_expired(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.tokens.len();
        tables
            .tokens
            .retain(|t| t.token.user_id != user_id || !t.token.is_expired(now));
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.tokens.len();
        tables.tokens.retain(|t| t.token.user_id != user_id);
        Ok((before - tables.tokens.len()) as u64)
    }
}

/// SMS gateway that records messages instead of sending them.
///
/// Clones share the same outbox.
#[derive(Clone, Default)]
pub struct RecordingSmsGateway {
    outbox: Arc<Mutex<Vec<(String, String)>>>,
    fail_next: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl RecordingSmsGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that waits `delay` before recording each message.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the next send fail with a provider error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every delivered `(phone, body)` pair, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The code in the latest message delivered to `phone`.
    #[must_use]
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        let phone = PhoneNumber::parse(phone).ok()?;
        self.sent()
            .into_iter()
            .rev()
            .find(|(to, _)| to == phone.as_str())
            .and_then(|(_, body)| {
                body.rsplit(": ")
                    .next()
                    .map(|tail| tail.trim_end_matches('.').to_owned())
            })
    }
}

#[async_trait]
impl SmsGateway for RecordingSmsGateway {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SmsError::Api {
                status: 503,
                message: "simulated outage".to_owned(),
            });
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to.as_str().to_owned(), body.to_owned()));
        Ok(())
    }
}

/// Configuration suitable for tests: log SMS provider, default policies,
/// no per-IP rate limiting.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/chatlink_test".to_owned()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        sms: SmsConfig::Log,
        otp: OtpPolicy::default(),
        tokens: TokenPolicy::default(),
        rate_limit: false,
        trust_proxy_headers: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Application state over in-memory backends, with handles to inspect them.
#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
    pub sms: RecordingSmsGateway,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_parts(config, RecordingSmsGateway::new())
    }

    /// Test app delivering through `sms`, e.g. a delayed gateway.
    #[must_use]
    pub fn with_sms(sms: RecordingSmsGateway) -> Self {
        Self::with_parts(test_config(), sms)
    }

    fn with_parts(config: ServerConfig, sms: RecordingSmsGateway) -> Self {
        let store = MemoryStore::new();
        let stores = Stores {
            users: Arc::new(store.clone()),
            otps: Arc::new(store.clone()),
            chats: Arc::new(store.clone()),
            tokens: Arc::new(store.clone()),
        };
        let state = AppState::with_stores(config, stores, Arc::new(sms.clone()));
        Self { state, store, sms }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
