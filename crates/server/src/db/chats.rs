//! `PostgreSQL` chat store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use chatlink_core::{ChatId, UserId};

use super::{ChatStore, RepositoryError};
use crate::models::ChatSession;

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: ChatId,
    user_from: Option<UserId>,
    user_to: Option<UserId>,
    created_at: DateTime<Utc>,
    accepted: bool,
}

impl From<ChatRow> for ChatSession {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            from: row.user_from,
            to: row.user_to,
            created_at: row.created_at,
            accepted: row.accepted,
        }
    }
}

/// Repository for chat introduction requests.
#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for ChatRepository {
    async fn create(&self, from: UserId, to: UserId) -> Result<ChatSession, RepositoryError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r"
            INSERT INTO chatlink.chat (user_from, user_to)
            VALUES ($1, $2)
            RETURNING id, user_from, user_to, created_at, accepted
            ",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get(&self, id: ChatId) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_from, user_to, created_at, accepted FROM chatlink.chat WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_accepted(&self, id: ChatId, recipient: UserId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE chatlink.chat SET accepted = TRUE WHERE id = $1 AND user_to = $2")
                .bind(id)
                .bind(recipient)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
