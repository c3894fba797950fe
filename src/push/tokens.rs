//! Authentication token issuance and lookup.
//!
//! Tokens are the session context handed to a device once a login attempt is
//! approved: created here, presented as `Authorization: Bearer` by the
//! approver-side endpoints, and invalidated by revocation or TTL. Raw values
//! are only ever returned to the caller; the issuer retains a SHA-256 hash.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct IssuedToken {
    email: String,
    issued_at: Instant,
}

pub struct TokenIssuer {
    ttl: Duration,
    tokens: Mutex<HashMap<Vec<u8>, IssuedToken>>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh token bound to an email.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub async fn issue(&self, email: &str) -> Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate authentication token")?;
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, entry| entry.issued_at.elapsed() < self.ttl);
        tokens.insert(
            hash_token(&token),
            IssuedToken {
                email: email.to_string(),
                issued_at: Instant::now(),
            },
        );
        Ok(token)
    }

    /// Resolve a presented token to the email it was issued for.
    pub async fn authenticate(&self, token: &str) -> Option<String> {
        let hash = hash_token(token.trim());
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, entry| entry.issued_at.elapsed() < self.ttl);
        tokens.get(&hash).map(|entry| entry.email.clone())
    }

    /// Drop a token, ending its session.
    pub async fn revoke(&self, token: &str) {
        let hash = hash_token(token.trim());
        self.tokens.lock().await.remove(&hash);
    }
}

/// Hash a token so raw values never sit in memory longer than needed.
fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
