//! `PostgreSQL` token store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use chatlink_core::{AuthTokenId, UserId};

use super::{RepositoryError, TokenStore, conflict_on_unique};
use crate::models::AuthToken;

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: AuthTokenId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for AuthToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Repository for login token digests.
#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for TokenRepository {
    async fn create(
        &self,
        user_id: UserId,
        digest: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AuthToken, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"
            INSERT INTO chatlink.auth_token (user_id, digest, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            ",
        )
        .bind(user_id)
        .bind(digest)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("token digest collision"))?;

        Ok(row.into())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<AuthToken>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT id, user_id, created_at, expires_at FROM chatlink.auth_token WHERE digest = $1",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn count_live(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM chatlink.auth_token
            WHERE user_id = $1 AND (expires_at IS NULL OR expires_at > $2)
            ",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete(&self, id: AuthTokenId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM chatlink.auth_token WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM chatlink.auth_token WHERE user_id = $1 AND expires_at <= $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM chatlink.auth_token WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
