//! End-to-end push login flow, in process and over HTTP.

use anyhow::{Context, Result};
use axum::{Extension, routing::get};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use aprobo::api::handlers::push::rate_limit::NoopRateLimiter;
use aprobo::api::handlers::push::state::PushState;
use aprobo::client::{PushAuthClient, PushAuthEvent, PushAuthSession, PushAuthState};
use aprobo::push::channel::ChannelMessage;
use aprobo::push::reference::ClientReference;
use aprobo::push::service::{ApprovalOutcome, PushAuthService, PushConfig};
use aprobo::push::store::MemoryAttemptStore;
use aprobo::push::{AttemptStatus, VerifyFailure};

fn service() -> Arc<PushAuthService> {
    Arc::new(PushAuthService::new(
        PushConfig::new(),
        Arc::new(MemoryAttemptStore::new()),
    ))
}

/// Map a registry subscription to machine events the way the SSE transport
/// does: open signal, then the terminal payload, then stream end.
fn channel_events(
    receiver: oneshot::Receiver<ChannelMessage>,
) -> impl futures_util::Stream<Item = PushAuthEvent> + Send + Unpin {
    futures::stream::once(async { PushAuthEvent::Opened })
        .chain(futures::stream::once(async move {
            match receiver.await {
                Ok(ChannelMessage::LoginSuccess { token }) => PushAuthEvent::LoginSuccess {
                    token: Some(token),
                },
                Ok(ChannelMessage::Error { message }) => PushAuthEvent::ChannelError { message },
                Err(_) => PushAuthEvent::ChannelClosed,
            }
        }))
        .boxed()
}

#[tokio::test]
async fn full_flow_against_the_service() -> Result<()> {
    let service = service();

    // Initiator requests a login.
    let attempt = service.create_attempt("owner@example.com").await?;
    assert_eq!(attempt.otp.len(), 6);
    assert_eq!(
        (attempt.expires_at - attempt.created_at).num_seconds(),
        120
    );

    // The reference that transits the address bar round-trips.
    let reference = ClientReference::new(&attempt.request_id, &attempt.owner_email)?;
    let decoded = ClientReference::decode(&reference.encode())?;
    assert_eq!(decoded.request_id(), attempt.request_id);
    assert_eq!(decoded.email(), "owner@example.com");

    // Initiator opens the channel and starts waiting.
    let receiver = service.channels().subscribe(decoded.request_id()).await;
    let session = PushAuthSession::spawn(channel_events(receiver), Duration::from_secs(120));

    // Approver sees exactly one pending attempt.
    let listed = service.list_attempts("owner@example.com").await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status_at(chrono::Utc::now()), AttemptStatus::Pending);

    // A wrong code does not consume the attempt.
    let wrong = if attempt.otp == "654321" { "123456" } else { "654321" };
    let outcome = service.verify(&attempt.request_id, wrong).await?;
    assert!(matches!(
        outcome,
        ApprovalOutcome::Rejected(VerifyFailure::OtpMismatch)
    ));

    // The right code wins and the waiting session sees the token.
    let outcome = service.verify(&attempt.request_id, &attempt.otp).await?;
    assert!(matches!(outcome, ApprovalOutcome::Approved { delivered: true }));

    let state = session.wait().await;
    let token = match state {
        PushAuthState::Success { token } => token,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(
        service.tokens().authenticate(&token).await.as_deref(),
        Some("owner@example.com")
    );

    // Replay is refused.
    let outcome = service.verify(&attempt.request_id, &attempt.otp).await?;
    assert!(matches!(
        outcome,
        ApprovalOutcome::Rejected(VerifyFailure::AlreadyApproved)
    ));

    // Teardown after success is a no-op.
    session.disconnect();
    session.disconnect();
    Ok(())
}

#[tokio::test]
async fn expired_attempt_never_verifies() -> Result<()> {
    let service = Arc::new(PushAuthService::new(
        // TTL of one second; the store clock does the rest.
        PushConfig::new().with_attempt_ttl_seconds(1),
        Arc::new(MemoryAttemptStore::new()),
    ));

    let attempt = service.create_attempt("owner@example.com").await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let outcome = service.verify(&attempt.request_id, &attempt.otp).await?;
    assert!(matches!(
        outcome,
        ApprovalOutcome::Rejected(VerifyFailure::Expired)
    ));

    // And the approver's list shows it as expired.
    let listed = service.list_attempts("owner@example.com").await?;
    assert_eq!(
        listed[0].status_at(chrono::Utc::now()),
        AttemptStatus::Expired
    );
    Ok(())
}

async fn spawn_server(service: Arc<PushAuthService>) -> Result<String> {
    let state = Arc::new(PushState::new(service, Arc::new(NoopRateLimiter)));
    let (router, _openapi) = aprobo::api::router().split_for_parts();
    let app = router
        .route("/", get(|| async { "ok" }))
        .layer(Extension(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind test listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn full_flow_over_http_and_sse() -> Result<()> {
    let service = service();
    let base_url = spawn_server(Arc::clone(&service)).await?;
    let client = PushAuthClient::new(&base_url)?.with_wait_timeout(Duration::from_secs(30));

    // Initiator: create the attempt and open the live channel.
    let start = client.request_login("Owner@Example.com").await?;
    assert_eq!(start.attempt.email, "owner@example.com");
    assert_eq!(start.attempt.otp.len(), 6);

    let session = client.open_session(&start.reference);

    // The channel open confirmation moves the machine to waiting.
    let mut watch = session.subscribe();
    let state = watch
        .wait_for(|state| *state == PushAuthState::Waiting || state.is_terminal())
        .await?
        .clone();
    assert_eq!(state, PushAuthState::Waiting);

    // Approver: authenticate, review, approve.
    let approver_token = service.tokens().issue("owner@example.com").await?;
    let attempts = client.list_attempts(&approver_token).await?;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].request_id, start.attempt.request_id);
    assert_eq!(attempts[0].status, "pending");

    // Wrong code first: generic rejection, nothing consumed.
    let wrong = if start.attempt.otp == "654321" { "123456" } else { "654321" };
    let rejected = client
        .approve(&approver_token, &start.attempt.request_id, wrong)
        .await;
    assert!(rejected.is_err());

    let approved = client
        .approve(&approver_token, &start.attempt.request_id, &start.attempt.otp)
        .await?;
    assert_eq!(approved.message, "Login approved");

    // The waiting session receives the one-time success with a live token.
    let state = session.wait().await;
    let token = match state {
        PushAuthState::Success { token } => token,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(
        service.tokens().authenticate(&token).await.as_deref(),
        Some("owner@example.com")
    );

    // Replaying the approval conflicts.
    let replay = client
        .approve(&approver_token, &start.attempt.request_id, &start.attempt.otp)
        .await;
    assert!(replay.is_err());
    Ok(())
}

#[tokio::test]
async fn malformed_reference_is_rejected_by_the_channel_endpoint() -> Result<()> {
    let service = service();
    let base_url = spawn_server(service).await?;

    let response = reqwest::get(format!("{base_url}/push/sse?clientId=%21%21nope%21%21")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    Ok(())
}
