//! Attempt store contract and the in-memory backend.
//!
//! The store is the only shared mutable resource in the flow and the sole
//! writer of attempt status. `verify_and_consume` is linearized per
//! `request_id`: of any number of concurrent verification calls, exactly one
//! wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use std::collections::HashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::push::models::{AttemptStatus, PushAuthAttempt, VerifyFailure};

/// Outcome of a verification call against the store.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// This call won: the attempt transitioned to approved.
    Approved(PushAuthAttempt),
    /// This call did not win; state was not mutated.
    Rejected(VerifyFailure),
}

/// Generate a fresh request id. ULIDs are URL-safe and never contain the
/// `_` reference delimiter.
pub(crate) fn generate_request_id() -> String {
    Ulid::new().to_string()
}

/// Generate a uniformly random, zero-padded 6-digit OTP.
pub(crate) fn generate_otp() -> String {
    format!("{:06}", OsRng.gen_range(0..=999_999u32))
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Create a pending attempt with a fresh request id and OTP.
    async fn create(&self, owner_email: &str, ttl: Duration) -> Result<PushAuthAttempt>;

    /// All attempts targeting an owner, newest first, regardless of status.
    /// Callers compute expired/pending from `expires_at`.
    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<PushAuthAttempt>>;

    /// Atomically check existence, pending status, expiry, and OTP match;
    /// flip the winner to approved. Losers never mutate state.
    async fn verify_and_consume(
        &self,
        request_id: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome>;

    /// Drop attempts whose expiry is older than the retention window.
    /// Returns how many rows went away.
    async fn purge_expired(&self, now: DateTime<Utc>, retention: Duration) -> Result<u64>;
}

struct MemoryInner {
    next_id: i64,
    attempts: HashMap<String, PushAuthAttempt>,
}

/// In-memory attempt store.
///
/// Backs the server when no DSN is configured and every test. The single
/// mutex makes the check-and-set in `verify_and_consume` atomic per store,
/// which is stricter than the per-`request_id` guarantee the contract asks
/// for.
pub struct MemoryAttemptStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                next_id: 0,
                attempts: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryAttemptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn create(&self, owner_email: &str, ttl: Duration) -> Result<PushAuthAttempt> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let attempt = PushAuthAttempt {
            id: inner.next_id,
            request_id: generate_request_id(),
            owner_email: owner_email.to_string(),
            otp: generate_otp(),
            created_at: now,
            expires_at: now + ttl,
            status: AttemptStatus::Pending,
        };
        inner
            .attempts
            .insert(attempt.request_id.clone(), attempt.clone());
        Ok(attempt)
    }

    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<PushAuthAttempt>> {
        let inner = self.inner.lock().await;
        let mut attempts: Vec<PushAuthAttempt> = inner
            .attempts
            .values()
            .filter(|attempt| attempt.owner_email == owner_email)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(attempts)
    }

    async fn verify_and_consume(
        &self,
        request_id: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(attempt) = inner.attempts.get_mut(request_id) else {
            return Ok(VerifyOutcome::Rejected(VerifyFailure::NotFound));
        };
        match attempt.status {
            AttemptStatus::Approved => {
                return Ok(VerifyOutcome::Rejected(VerifyFailure::AlreadyApproved));
            }
            AttemptStatus::Expired => {
                return Ok(VerifyOutcome::Rejected(VerifyFailure::Expired));
            }
            AttemptStatus::Pending => {}
        }
        if now >= attempt.expires_at {
            // Expiry wins over OTP correctness; the row stays pending until
            // the sweeper removes it.
            return Ok(VerifyOutcome::Rejected(VerifyFailure::Expired));
        }
        if attempt.otp != otp {
            return Ok(VerifyOutcome::Rejected(VerifyFailure::OtpMismatch));
        }
        attempt.status = AttemptStatus::Approved;
        Ok(VerifyOutcome::Approved(attempt.clone()))
    }

    async fn purge_expired(&self, now: DateTime<Utc>, retention: Duration) -> Result<u64> {
        let cutoff = now - retention;
        let mut inner = self.inner.lock().await;
        let before = inner.attempts.len();
        inner.attempts.retain(|_, attempt| attempt.expires_at > cutoff);
        Ok((before - inner.attempts.len()) as u64)
    }
}
