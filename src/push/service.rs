//! Push authentication service: attempt lifecycle and approval.
//!
//! Owns the shared pieces of the flow (attempt store, channel registry,
//! token issuer) and wires an approval to the waiting initiator's channel.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::push::channel::ChannelRegistry;
use crate::push::models::{PushAuthAttempt, VerifyFailure};
use crate::push::store::{AttemptStore, VerifyOutcome};
use crate::push::tokens::TokenIssuer;

const DEFAULT_ATTEMPT_TTL_SECONDS: i64 = 120;
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_RETENTION_SECONDS: i64 = 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct PushConfig {
    attempt_ttl_seconds: i64,
    token_ttl_seconds: u64,
    retention_seconds: i64,
    sweep_interval_seconds: u64,
}

impl PushConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt_ttl_seconds: DEFAULT_ATTEMPT_TTL_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            retention_seconds: DEFAULT_RETENTION_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_attempt_ttl_seconds(mut self, seconds: i64) -> Self {
        self.attempt_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_retention_seconds(mut self, seconds: i64) -> Self {
        self.retention_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn attempt_ttl_seconds(&self) -> i64 {
        self.attempt_ttl_seconds
    }

    pub(crate) fn attempt_ttl(&self) -> Duration {
        Duration::seconds(self.attempt_ttl_seconds)
    }

    pub(crate) fn retention(&self) -> Duration {
        Duration::seconds(self.retention_seconds)
    }

    pub(crate) fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of an approval request.
#[derive(Debug)]
pub enum ApprovalOutcome {
    /// The attempt was consumed. `delivered` says whether a waiting channel
    /// actually received the token; an initiator that navigated away simply
    /// misses the event.
    Approved { delivered: bool },
    /// The attempt was not consumed and nothing was mutated.
    Rejected(VerifyFailure),
}

pub struct PushAuthService {
    config: PushConfig,
    store: Arc<dyn AttemptStore>,
    channels: ChannelRegistry,
    tokens: TokenIssuer,
}

impl PushAuthService {
    #[must_use]
    pub fn new(config: PushConfig, store: Arc<dyn AttemptStore>) -> Self {
        let channel_ttl = StdDuration::from_secs(config.attempt_ttl_seconds.unsigned_abs());
        let token_ttl = StdDuration::from_secs(config.token_ttl_seconds);
        Self {
            config,
            store,
            channels: ChannelRegistry::new(channel_ttl),
            tokens: TokenIssuer::new(token_ttl),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn AttemptStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Create a pending attempt for an owner email.
    ///
    /// The email is not checked for existence here; that is the account
    /// system's concern.
    ///
    /// # Errors
    /// Returns an error if the store is unavailable.
    pub async fn create_attempt(&self, owner_email: &str) -> Result<PushAuthAttempt> {
        let attempt = self
            .store
            .create(owner_email, self.config.attempt_ttl())
            .await?;
        info!(
            request_id = %attempt.request_id,
            expires_at = %attempt.expires_at,
            "created push auth attempt"
        );
        Ok(attempt)
    }

    /// All attempts for an owner, newest first.
    ///
    /// # Errors
    /// Returns an error if the store is unavailable.
    pub async fn list_attempts(&self, owner_email: &str) -> Result<Vec<PushAuthAttempt>> {
        self.store.list_for_owner(owner_email).await
    }

    /// Verify an entered OTP against a pending attempt and, on the winning
    /// call, issue a token and push `login-success` to the open channel.
    ///
    /// The caller is expected to have trimmed the OTP and rejected empty
    /// input already; the store remains the source of truth for match
    /// correctness.
    ///
    /// # Errors
    /// Returns an error if the store or the RNG fails.
    pub async fn verify(&self, request_id: &str, otp: &str) -> Result<ApprovalOutcome> {
        let outcome = self
            .store
            .verify_and_consume(request_id, otp, Utc::now())
            .await?;

        match outcome {
            VerifyOutcome::Approved(attempt) => {
                let token = self.tokens.issue(&attempt.owner_email).await?;
                let delivered = self
                    .channels
                    .notify_success(&attempt.request_id, token)
                    .await;
                info!(
                    request_id = %attempt.request_id,
                    delivered,
                    "push auth attempt approved"
                );
                Ok(ApprovalOutcome::Approved { delivered })
            }
            VerifyOutcome::Rejected(failure) => {
                // Mismatch and expiry are logged apart even though the
                // approver sees one generic message.
                debug!(request_id, reason = failure.as_str(), "push auth verify rejected");
                Ok(ApprovalOutcome::Rejected(failure))
            }
        }
    }
}

/// Spawn the background sweeper: purges attempts past the retention window
/// and prunes stale channel subscriptions on a fixed interval.
pub fn spawn_sweeper(service: Arc<PushAuthService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(service.config().sweep_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let retention = service.config().retention();
            match service.store().purge_expired(Utc::now(), retention).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "purged expired push auth attempts"),
                Err(err) => error!("failed to purge expired push auth attempts: {err}"),
            }
            let pruned = service.channels().prune().await;
            if pruned > 0 {
                debug!(pruned, "pruned stale notification channels");
            }
        }
    })
}
