//! Request/response types for push auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::push::models::PushAuthAttempt;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PushLoginRequest {
    pub email: String,
}

/// Attempt data handed back to the initiator. The OTP is shown on the
/// unauthenticated device and relayed to the approver out-of-band; it is
/// never embedded in the client reference.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PushLoginResponse {
    pub request_id: String,
    pub email: String,
    pub otp: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<PushAuthAttempt> for PushLoginResponse {
    fn from(attempt: PushAuthAttempt) -> Self {
        Self {
            request_id: attempt.request_id,
            email: attempt.owner_email,
            otp: attempt.otp,
            created_at: attempt.created_at,
            expires_at: attempt.expires_at,
        }
    }
}

/// One row of the approver's pending-attempt list. `status` is computed from
/// `expires_at` against the clock at response time; the OTP never leaves the
/// initiator path.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AttemptResponse {
    pub id: i64,
    pub request_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
}

impl AttemptResponse {
    #[must_use]
    pub fn from_attempt(attempt: &PushAuthAttempt, now: DateTime<Utc>) -> Self {
        Self {
            id: attempt.id,
            request_id: attempt.request_id.clone(),
            email: attempt.owner_email.clone(),
            created_at: attempt.created_at,
            expires_at: attempt.expires_at,
            status: attempt.status_at(now).as_str().to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub request_id: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyResponse {
    pub message: String,
}

/// Query parameters for the notification channel endpoint.
#[derive(Deserialize, Debug)]
pub struct SseParams {
    #[serde(rename = "clientId")]
    pub client_id: String,
}
