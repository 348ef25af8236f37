//! `PostgreSQL` identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use chatlink_core::{Email, OtpCode, OtpRecordId, PhoneNumber, UserId, UserRole};

use super::{IdentityStore, RepositoryError, conflict_on_unique};
use crate::models::{NewUser, User};

/// Row shape shared by every query that returns a user.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    phone: String,
    name: Option<String>,
    email: Option<String>,
    is_staff: bool,
    is_admin: bool,
    active: bool,
    first_login: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            phone,
            name: row.name,
            email,
            role: UserRole::from_flags(row.is_staff, row.is_admin),
            active: row.active,
            first_login: row.first_login,
            last_login: row.last_login,
            created_at: row.created_at,
        })
    }
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for UserRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, phone, name, email, is_staff, is_admin, active,
                   first_login, last_login, created_at
            FROM chatlink.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, phone, name, email, is_staff, is_admin, active,
                   first_login, last_login, created_at
            FROM chatlink.users
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_password_hash(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            r"
            SELECT id, phone, name, email, is_staff, is_admin, active,
                   first_login, last_login, created_at, password_hash
            FROM chatlink.users
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn get_password_hash_by_id(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM chatlink.users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO chatlink.users (phone, password_hash, name, email, is_staff, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, phone, name, email, is_staff, is_admin, active,
                      first_login, last_login, created_at
            ",
        )
        .bind(user.phone.as_str())
        .bind(&user.password_hash)
        .bind(user.name.as_deref())
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(user.role.is_staff())
        .bind(user.role.is_admin())
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("phone already registered"))?;

        User::try_from(row)
    }

    async fn create_from_verified_otp(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query_scalar::<_, OtpRecordId>(
            "DELETE FROM chatlink.phone_otp WHERE phone = $1 AND verified RETURNING id",
        )
        .bind(user.phone.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            // Dropping `tx` rolls back
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO chatlink.users (phone, password_hash, name, email, is_staff, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, phone, name, email, is_staff, is_admin, active,
                      first_login, last_login, created_at
            ",
        )
        .bind(user.phone.as_str())
        .bind(&user.password_hash)
        .bind(user.name.as_deref())
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(user.role.is_staff())
        .bind(user.role.is_admin())
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("phone already registered"))?;

        tx.commit().await?;

        User::try_from(row)
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chatlink.users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn reset_password_from_otp(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query_scalar::<_, OtpRecordId>(
            r"
            DELETE FROM chatlink.phone_otp
            WHERE phone = $1 AND otp = $2 AND forgot_verified
            RETURNING id
            ",
        )
        .bind(phone.as_str())
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE chatlink.users
            SET password_hash = $2, active = TRUE
            WHERE phone = $1
            RETURNING id, phone, name, email, is_staff, is_admin, active,
                      first_login, last_login, created_at
            ",
        )
        .bind(phone.as_str())
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        User::try_from(row)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<User, RepositoryError> {
        // first_login is true exactly when there was no previous login
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE chatlink.users
            SET first_login = (last_login IS NULL), last_login = $2
            WHERE id = $1
            RETURNING id, phone, name, email, is_staff, is_admin, active,
                      first_login, last_login, created_at
            ",
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }
}
