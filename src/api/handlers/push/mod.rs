//! Push auth endpoints: attempt creation, the notification channel, the
//! approver's listing, and approval verification.

pub mod rate_limit;
pub mod state;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::future;
use std::sync::Arc;
use tracing::{debug, error};

use crate::push::channel::ChannelMessage;
use crate::push::models::VerifyFailure;
use crate::push::reference::ClientReference;
use crate::push::service::ApprovalOutcome;

use super::{extract_bearer_token, extract_client_ip, normalize_email, valid_email};
use rate_limit::{RateLimitAction, RateLimitDecision};
use state::PushState;
use types::{AttemptResponse, PushLoginRequest, PushLoginResponse, SseParams, VerifyRequest,
    VerifyResponse};

/// Create a pending login attempt for an email.
///
/// The response includes the OTP for the initiator to display; the email is
/// not checked for existence here.
#[utoipa::path(
    post,
    path = "/push/generate",
    request_body = PushLoginRequest,
    responses(
        (status = 201, description = "Attempt created", body = PushLoginResponse),
        (status = 400, description = "Missing or invalid email", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "push"
)]
pub async fn generate(
    headers: HeaderMap,
    state: Extension<Arc<PushState>>,
    payload: Option<Json<PushLoginRequest>>,
) -> impl IntoResponse {
    let request: PushLoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Generate)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Generate)
            == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    match state.service().create_attempt(&email).await {
        Ok(attempt) => (
            StatusCode::CREATED,
            Json(PushLoginResponse::from(attempt)),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create push auth attempt: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create attempt".to_string(),
            )
                .into_response()
        }
    }
}

/// Open the notification channel for a waiting session.
///
/// Emits an open signal, then at most one terminal event, then closes. A
/// session that times out closes the stream from its own side; that is not
/// a channel error.
#[utoipa::path(
    get,
    path = "/push/sse",
    params(
        ("clientId" = String, Query, description = "Encoded client reference")
    ),
    responses(
        (status = 200, description = "Server-sent event stream of login events"),
        (status = 400, description = "Malformed client reference", body = String)
    ),
    tag = "push"
)]
pub async fn sse(
    Query(params): Query<SseParams>,
    state: Extension<Arc<PushState>>,
) -> Response {
    let reference = match ClientReference::decode(&params.client_id) {
        Ok(reference) => reference,
        Err(err) => {
            debug!("rejected notification channel subscription: {err}");
            return (
                StatusCode::BAD_REQUEST,
                "Malformed client reference".to_string(),
            )
                .into_response();
        }
    };

    let receiver = state
        .service()
        .channels()
        .subscribe(reference.request_id())
        .await;

    let open = Event::default().data("Connection established");
    let stream = futures::stream::once(future::ready(Some(open)))
        .chain(futures::stream::once(async move {
            match receiver.await {
                Ok(ChannelMessage::LoginSuccess { token }) => Some(
                    Event::default()
                        .event("login-success")
                        .data(json!({ "token": token }).to_string()),
                ),
                Ok(ChannelMessage::Error { message }) => {
                    Some(Event::default().event("error").data(message))
                }
                // Sender gone: replaced by a newer subscription or pruned.
                // End the stream without a terminal event.
                Err(_) => None,
            }
        }))
        .filter_map(|event| future::ready(event.map(Ok::<_, Infallible>)));

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// List the authenticated owner's attempts, newest first. Status is
/// computed against the clock at response time.
#[utoipa::path(
    get,
    path = "/push/attempts",
    responses(
        (status = 200, description = "Attempts for the authenticated owner", body = [AttemptResponse]),
        (status = 401, description = "Missing or invalid token", body = String)
    ),
    tag = "push"
)]
pub async fn attempts(
    headers: HeaderMap,
    state: Extension<Arc<PushState>>,
) -> impl IntoResponse {
    let Some(email) = authenticate(&headers, &state).await else {
        return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
    };

    match state.service().list_attempts(&email).await {
        Ok(attempts) => {
            let now = Utc::now();
            let rows: Vec<AttemptResponse> = attempts
                .iter()
                .map(|attempt| AttemptResponse::from_attempt(attempt, now))
                .collect();
            (StatusCode::OK, Json(rows)).into_response()
        }
        Err(err) => {
            error!("Failed to list push auth attempts: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list attempts".to_string(),
            )
                .into_response()
        }
    }
}

/// Approve a pending attempt by entering its OTP.
///
/// Mismatched and expired codes produce the same message so a guesser
/// learns nothing about which factor failed; logs keep them apart.
#[utoipa::path(
    post,
    path = "/push/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Attempt approved", body = VerifyResponse),
        (status = 400, description = "Invalid or expired code", body = String),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 404, description = "Attempt not found", body = String),
        (status = 409, description = "Attempt already approved", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "push"
)]
pub async fn verify(
    headers: HeaderMap,
    state: Extension<Arc<PushState>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let Some(email) = authenticate(&headers, &state).await else {
        return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
    };

    let request: VerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let otp = request.otp.trim();
    if otp.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing OTP".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Verify)
        == RateLimitDecision::Limited
        || state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Verify)
            == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    match state.service().verify(&request.request_id, otp).await {
        Ok(ApprovalOutcome::Approved { .. }) => (
            StatusCode::OK,
            Json(VerifyResponse {
                message: "Login approved".to_string(),
            }),
        )
            .into_response(),
        Ok(ApprovalOutcome::Rejected(failure)) => rejection_response(failure),
        Err(err) => {
            error!("Failed to verify push auth attempt: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response()
        }
    }
}

async fn authenticate(headers: &HeaderMap, state: &PushState) -> Option<String> {
    let token = extract_bearer_token(headers)?;
    state.service().tokens().authenticate(&token).await
}

fn rejection_response(failure: VerifyFailure) -> Response {
    match failure {
        VerifyFailure::NotFound => {
            (StatusCode::NOT_FOUND, "Login attempt not found".to_string()).into_response()
        }
        VerifyFailure::AlreadyApproved => (
            StatusCode::CONFLICT,
            "Login attempt already approved".to_string(),
        )
            .into_response(),
        // One message for both: no oracle on which factor failed.
        VerifyFailure::OtpMismatch | VerifyFailure::Expired => (
            StatusCode::BAD_REQUEST,
            "Invalid or expired code".to_string(),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::rate_limit::NoopRateLimiter;
    use super::state::PushState;
    use super::*;
    use crate::push::service::{PushAuthService, PushConfig};
    use crate::push::store::MemoryAttemptStore;
    use anyhow::{Context, Result};
    use axum::body::to_bytes;
    use axum::http::HeaderValue;

    fn push_state() -> Arc<PushState> {
        let service = Arc::new(PushAuthService::new(
            PushConfig::new(),
            Arc::new(MemoryAttemptStore::new()),
        ));
        Arc::new(PushState::new(service, Arc::new(NoopRateLimiter)))
    }

    fn bearer(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        Ok(headers)
    }

    async fn body_string(response: Response) -> Result<String> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn generate_missing_payload() {
        let response = generate(HeaderMap::new(), Extension(push_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_invalid_email() {
        let response = generate(
            HeaderMap::new(),
            Extension(push_state()),
            Some(Json(PushLoginRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_returns_attempt_with_otp() -> Result<()> {
        let response = generate(
            HeaderMap::new(),
            Extension(push_state()),
            Some(Json(PushLoginRequest {
                email: " Owner@Example.COM ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: PushLoginResponse = serde_json::from_str(&body_string(response).await?)?;
        assert_eq!(body.email, "owner@example.com");
        assert_eq!(body.otp.len(), 6);
        assert!(!body.request_id.contains('_'));
        Ok(())
    }

    #[tokio::test]
    async fn sse_rejects_malformed_reference() {
        let response = sse(
            Query(SseParams {
                client_id: "!!definitely-not-base64!!".to_string(),
            }),
            Extension(push_state()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sse_accepts_valid_reference() -> Result<()> {
        let state = push_state();
        let reference = ClientReference::new("01JXAMPLE0000000000000000G", "owner@example.com")
            .context("build reference")?;
        let response = sse(
            Query(SseParams {
                client_id: reference.encode(),
            }),
            Extension(state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn attempts_requires_valid_token() {
        let response = attempts(HeaderMap::new(), Extension(push_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn attempts_lists_owner_attempts_with_status() -> Result<()> {
        let state = push_state();
        state.service().create_attempt("owner@example.com").await?;
        state.service().create_attempt("other@example.com").await?;
        let token = state.service().tokens().issue("owner@example.com").await?;

        let response = attempts(bearer(&token)?, Extension(Arc::clone(&state)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let rows: Vec<AttemptResponse> = serde_json::from_str(&body_string(response).await?)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].email, "owner@example.com");
        assert_eq!(rows[0].status, "pending");
        Ok(())
    }

    #[tokio::test]
    async fn verify_requires_valid_token() {
        let response = verify(
            HeaderMap::new(),
            Extension(push_state()),
            Some(Json(VerifyRequest {
                request_id: "r1".to_string(),
                otp: "123456".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_rejects_empty_otp() -> Result<()> {
        let state = push_state();
        let token = state.service().tokens().issue("owner@example.com").await?;
        let response = verify(
            bearer(&token)?,
            Extension(state),
            Some(Json(VerifyRequest {
                request_id: "r1".to_string(),
                otp: "   ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await?, "Missing OTP");
        Ok(())
    }

    #[tokio::test]
    async fn verify_approves_then_conflicts_then_hides_the_reason() -> Result<()> {
        let state = push_state();
        let attempt = state.service().create_attempt("owner@example.com").await?;
        let token = state.service().tokens().issue("owner@example.com").await?;

        // Wrong OTP: generic message, attempt stays pending.
        let wrong = if attempt.otp == "654321" { "123456" } else { "654321" };
        let response = verify(
            bearer(&token)?,
            Extension(Arc::clone(&state)),
            Some(Json(VerifyRequest {
                request_id: attempt.request_id.clone(),
                otp: wrong.to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await?, "Invalid or expired code");

        // Correct OTP wins.
        let response = verify(
            bearer(&token)?,
            Extension(Arc::clone(&state)),
            Some(Json(VerifyRequest {
                request_id: attempt.request_id.clone(),
                otp: attempt.otp.clone(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        // Replays see the conflict.
        let response = verify(
            bearer(&token)?,
            Extension(state),
            Some(Json(VerifyRequest {
                request_id: attempt.request_id.clone(),
                otp: attempt.otp.clone(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn verify_unknown_request_id_is_not_found() -> Result<()> {
        let state = push_state();
        let token = state.service().tokens().issue("owner@example.com").await?;
        let response = verify(
            bearer(&token)?,
            Extension(state),
            Some(Json(VerifyRequest {
                request_id: "01JNOSUCHREQUEST0000000000".to_string(),
                otp: "123456".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
