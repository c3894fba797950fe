//! Initiator- and approver-side client for the push auth API.
//!
//! The Rust counterpart of the reference web client: request a login, show
//! the OTP with a countdown, wait on the notification channel, and approve
//! pending attempts from a trusted device.

pub mod countdown;
pub mod machine;
pub mod session;
mod sse;

pub use countdown::{Countdown, format_mm_ss};
pub use machine::{PushAuthEvent, PushAuthState, transition};
pub use session::{DEFAULT_WAIT_TIMEOUT, PushAuthSession};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

use crate::api::handlers::push::types::{
    AttemptResponse, PushLoginRequest, PushLoginResponse, VerifyRequest, VerifyResponse,
};
use crate::push::reference::ClientReference;

/// A created attempt plus the reference that correlates the waiting session
/// with it.
#[derive(Debug)]
pub struct PushLoginStart {
    pub attempt: PushLoginResponse,
    pub reference: ClientReference,
}

/// HTTP client for the push auth endpoints.
pub struct PushAuthClient {
    http: reqwest::Client,
    base_url: String,
    wait_timeout: Duration,
}

impl PushAuthClient {
    /// Build a client against a server base URL.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("invalid server URL: {base_url}"))?;
        let http = reqwest::Client::builder()
            .user_agent(crate::api::APP_USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Request a push login for an email: creates the pending attempt and
    /// derives the client reference for the waiting session.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success response.
    pub async fn request_login(&self, email: &str) -> Result<PushLoginStart> {
        let url = format!("{}/push/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&PushLoginRequest {
                email: email.to_string(),
            })
            .send()
            .await
            .context("failed to request push login")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("push login request failed: {status} {body}"));
        }

        let attempt: PushLoginResponse = response
            .json()
            .await
            .context("failed to decode push login response")?;
        let reference = ClientReference::new(&attempt.request_id, &attempt.email)
            .context("server returned an unusable request id")?;
        Ok(PushLoginStart { attempt, reference })
    }

    /// Open the notification channel for a reference and drive a session
    /// over it. The session times out after the configured wait window.
    #[must_use]
    pub fn open_session(&self, reference: &ClientReference) -> PushAuthSession {
        // The encoded reference is base64 and needs query escaping.
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("clientId", &reference.encode())
            .finish();
        let url = format!("{}/push/sse?{query}", self.base_url);
        let events = sse::open_event_stream(self.http.clone(), url);
        PushAuthSession::spawn(events, self.wait_timeout)
    }

    /// List the authenticated owner's attempts, newest first.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success response.
    pub async fn list_attempts(&self, token: &str) -> Result<Vec<AttemptResponse>> {
        let url = format!("{}/push/attempts", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("failed to list push attempts")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("listing push attempts failed: {status} {body}"));
        }

        response
            .json()
            .await
            .context("failed to decode push attempts")
    }

    /// Approve a pending attempt by entering its OTP.
    ///
    /// The OTP is trimmed and must be non-empty and at most 6 characters;
    /// the server stays the source of truth for match correctness.
    ///
    /// # Errors
    /// Returns an error for invalid input, transport failure, or a
    /// rejection from the server.
    pub async fn approve(&self, token: &str, request_id: &str, otp: &str) -> Result<VerifyResponse> {
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(anyhow!("enter the code shown on the requesting device"));
        }
        if otp.len() > 6 {
            return Err(anyhow!("the code is at most 6 digits"));
        }

        let url = format!("{}/push/verify", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&VerifyRequest {
                request_id: request_id.to_string(),
                otp: otp.to_string(),
            })
            .send()
            .await
            .context("failed to verify push attempt")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("approval rejected: {status} {body}"));
        }

        response
            .json()
            .await
            .context("failed to decode verify response")
    }
}

/// Authenticated session context for a device.
///
/// Created on a successful login, invalidated on logout or server
/// rejection; everything else reads it through `token()`.
#[derive(Debug)]
pub struct AuthSession {
    token: Option<String>,
    established_at: DateTime<Utc>,
}

impl AuthSession {
    #[must_use]
    pub fn establish(token: String) -> Self {
        Self {
            token: Some(token),
            established_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// End the session; later `token()` reads yield nothing.
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}
