//! Postgres-backed attempt store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE push_auth_attempts (
//!     id          BIGSERIAL PRIMARY KEY,
//!     request_id  TEXT NOT NULL UNIQUE,
//!     owner_email TEXT NOT NULL,
//!     otp         TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     expires_at  TIMESTAMPTZ NOT NULL,
//!     status      TEXT NOT NULL DEFAULT 'pending'
//! );
//! CREATE INDEX push_auth_attempts_owner_idx ON push_auth_attempts (owner_email, id DESC);
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use crate::push::models::{AttemptStatus, PushAuthAttempt, VerifyFailure};
use crate::push::store::{AttemptStore, VerifyOutcome, generate_otp, generate_request_id};

pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create(&self, owner_email: &str, ttl: Duration) -> Result<PushAuthAttempt> {
        let now = Utc::now();
        let request_id = generate_request_id();
        let otp = generate_otp();
        let expires_at = now + ttl;

        let query = r"
            INSERT INTO push_auth_attempts
                (request_id, owner_email, otp, created_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&request_id)
            .bind(owner_email)
            .bind(&otp)
            .bind(now)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert push auth attempt")?;

        Ok(PushAuthAttempt {
            id: row.get("id"),
            request_id,
            owner_email: owner_email.to_string(),
            otp,
            created_at: now,
            expires_at,
            status: AttemptStatus::Pending,
        })
    }

    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<PushAuthAttempt>> {
        let query = r"
            SELECT id, request_id, owner_email, otp, created_at, expires_at, status
            FROM push_auth_attempts
            WHERE owner_email = $1
            ORDER BY id DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, PushAuthAttempt>(query)
            .bind(owner_email)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list push auth attempts")
    }

    async fn verify_and_consume(
        &self,
        request_id: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome> {
        // Row lock keeps the check-then-set linearized per request_id; two
        // concurrent callers serialize here and only the first still sees
        // 'pending'.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin verify transaction")?;

        let query = r"
            SELECT id, request_id, owner_email, otp, created_at, expires_at, status
            FROM push_auth_attempts
            WHERE request_id = $1
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let attempt = sqlx::query_as::<_, PushAuthAttempt>(query)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock push auth attempt")?;

        let Some(mut attempt) = attempt else {
            let _ = tx.rollback().await;
            return Ok(VerifyOutcome::Rejected(VerifyFailure::NotFound));
        };

        let rejection = match attempt.status {
            AttemptStatus::Approved => Some(VerifyFailure::AlreadyApproved),
            AttemptStatus::Expired => Some(VerifyFailure::Expired),
            AttemptStatus::Pending if now >= attempt.expires_at => Some(VerifyFailure::Expired),
            AttemptStatus::Pending if attempt.otp != otp => Some(VerifyFailure::OtpMismatch),
            AttemptStatus::Pending => None,
        };
        if let Some(failure) = rejection {
            let _ = tx.rollback().await;
            return Ok(VerifyOutcome::Rejected(failure));
        }

        let query = "UPDATE push_auth_attempts SET status = 'approved' WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(attempt.id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to approve push auth attempt")?;

        tx.commit().await.context("commit verify transaction")?;

        attempt.status = AttemptStatus::Approved;
        Ok(VerifyOutcome::Approved(attempt))
    }

    async fn purge_expired(&self, now: DateTime<Utc>, retention: Duration) -> Result<u64> {
        let cutoff = now - retention;
        let query = "DELETE FROM push_auth_attempts WHERE expires_at < $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge expired push auth attempts")?;
        Ok(result.rows_affected())
    }
}
