//! `PostgreSQL` OTP ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use chatlink_core::{OtpCode, OtpRecordId, PhoneNumber};

use super::{OtpLedger, OtpReservation, RepositoryError};
use crate::models::{OtpPurpose, OtpRecord};

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: OtpRecordId,
    phone: String,
    otp: String,
    send_count: i32,
    verified: bool,
    forgot: bool,
    forgot_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpRecord {
    type Error = RepositoryError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let code = OtpCode::parse(&row.otp).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid otp in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            phone,
            code,
            send_count: row.send_count,
            verified: row.verified,
            forgot: row.forgot,
            forgot_verified: row.forgot_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for pending verification codes.
#[derive(Clone)]
pub struct OtpRepository {
    pool: PgPool,
}

impl OtpRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpLedger for OtpRepository {
    async fn find(&self, phone: &PhoneNumber) -> Result<Option<OtpRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRow>(
            r"
            SELECT id, phone, otp, send_count, verified, forgot, forgot_verified,
                   created_at, updated_at
            FROM chatlink.phone_otp
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OtpRecord::try_from).transpose()
    }

    async fn reserve(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
        purpose: OtpPurpose,
        cap: i32,
    ) -> Result<Option<Box<dyn OtpReservation>>, RepositoryError> {
        // The upsert takes the row lock, which the open transaction holds
        // until commit or rollback.
        let sql = match purpose {
            OtpPurpose::Registration => {
                r"
                INSERT INTO chatlink.phone_otp AS o (phone, otp, send_count)
                VALUES ($1, $2, 1)
                ON CONFLICT (phone) DO UPDATE
                SET otp = EXCLUDED.otp,
                    send_count = o.send_count + 1,
                    verified = FALSE,
                    updated_at = NOW()
                WHERE o.send_count < $3
                RETURNING id, phone, otp, send_count, verified, forgot, forgot_verified,
                          created_at, updated_at
                "
            }
            OtpPurpose::PasswordReset => {
                r"
                INSERT INTO chatlink.phone_otp AS o (phone, otp, send_count, forgot)
                VALUES ($1, $2, 1, TRUE)
                ON CONFLICT (phone) DO UPDATE
                SET otp = EXCLUDED.otp,
                    send_count = o.send_count + 1,
                    forgot = TRUE,
                    forgot_verified = FALSE,
                    updated_at = NOW()
                WHERE o.send_count < $3
                RETURNING id, phone, otp, send_count, verified, forgot, forgot_verified,
                          created_at, updated_at
                "
            }
        };

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OtpRow>(sql)
            .bind(phone.as_str())
            .bind(code)
            .bind(cap)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            // Dropping `tx` rolls back
            return Ok(None);
        };
        let record = OtpRecord::try_from(row)?;

        Ok(Some(Box::new(PgOtpReservation { tx, record })))
    }

    async fn mark_verified(
        &self,
        id: OtpRecordId,
        code: &OtpCode,
        purpose: OtpPurpose,
    ) -> Result<bool, RepositoryError> {
        let sql = match purpose {
            OtpPurpose::Registration => {
                r"
                UPDATE chatlink.phone_otp
                SET verified = TRUE, updated_at = NOW()
                WHERE id = $1 AND otp = $2
                "
            }
            OtpPurpose::PasswordReset => {
                r"
                UPDATE chatlink.phone_otp
                SET forgot_verified = TRUE, updated_at = NOW()
                WHERE id = $1 AND otp = $2 AND forgot
                "
            }
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(code)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Staged send inside an open transaction.
struct PgOtpReservation {
    tx: Transaction<'static, Postgres>,
    record: OtpRecord,
}

#[async_trait]
impl OtpReservation for PgOtpReservation {
    fn record(&self) -> &OtpRecord {
        &self.record
    }

    async fn commit(self: Box<Self>) -> Result<OtpRecord, RepositoryError> {
        let Self { tx, record } = *self;
        tx.commit().await?;
        Ok(record)
    }
}
