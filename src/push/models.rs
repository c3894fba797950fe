use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};

/// Status of a push-login attempt.
///
/// `Expired` is derived from `now` vs `expires_at`; `Approved` is set exactly
/// once by the winning verification. Both are terminal: a terminal attempt
/// never matches again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Approved,
    Expired,
}

impl AttemptStatus {
    /// Parse the persisted `push_auth_attempts.status` textual value.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "expired" => Ok(Self::Expired),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid push_auth_attempts.status value: {value}"),
            )))),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Expired => "expired",
        }
    }
}

/// One push-login attempt: request id, single-use OTP, and a fixed expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushAuthAttempt {
    pub id: i64,
    pub request_id: String,
    pub owner_email: String,
    pub otp: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: AttemptStatus,
}

impl PushAuthAttempt {
    /// Effective status at `now`: a pending attempt past its expiry reads as
    /// expired even before the sweeper touches the stored row.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> AttemptStatus {
        if self.status == AttemptStatus::Pending && now >= self.expires_at {
            AttemptStatus::Expired
        } else {
            self.status
        }
    }
}

impl<'r> FromRow<'r, PgRow> for PushAuthAttempt {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            request_id: row.try_get("request_id")?,
            owner_email: row.try_get("owner_email")?,
            otp: row.try_get("otp")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            status: AttemptStatus::from_db(&status)?,
        })
    }
}

/// Why a verification call did not win.
///
/// None of these mutate the attempt; `OtpMismatch` and `Expired` are logged
/// distinctly but shown identically to the approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    NotFound,
    Expired,
    AlreadyApproved,
    OtpMismatch,
}

impl VerifyFailure {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::AlreadyApproved => "already_approved",
            Self::OtpMismatch => "otp_mismatch",
        }
    }
}
