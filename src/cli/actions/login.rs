use anyhow::Result;
use std::time::Duration;
use tracing::info;

use crate::client::{
    AuthSession, Countdown, PushAuthClient, PushAuthState, format_mm_ss,
};

#[derive(Debug)]
pub struct Args {
    pub server_url: String,
    pub email: String,
    pub wait_timeout_seconds: u64,
}

/// Execute the initiator flow: create an attempt, display the OTP with a
/// countdown, open the notification channel, and wait for the terminal
/// state.
///
/// # Errors
/// Returns an error if the attempt cannot be created or the login is not
/// approved.
pub async fn execute(args: Args) -> Result<()> {
    let client = PushAuthClient::new(&args.server_url)?
        .with_wait_timeout(Duration::from_secs(args.wait_timeout_seconds));

    let start = client.request_login(&args.email).await?;
    let remaining = (start.attempt.expires_at - chrono::Utc::now())
        .num_seconds()
        .clamp(0, i64::from(u32::MAX));

    println!("Login requested for {}", start.attempt.email);
    println!("Code: {}", start.attempt.otp);
    println!(
        "Approve from a trusted device within {}.",
        format_mm_ss(remaining as u32)
    );

    let countdown = Countdown::new(remaining as u32, || {
        println!("The code expired; request a new login.");
    });
    countdown.start();

    let session = client.open_session(&start.reference);

    // Reassure the user now and then while the channel stays quiet.
    let mut watch = session.subscribe();
    loop {
        tokio::select! {
            changed = watch.changed() => {
                if changed.is_err() || watch.borrow().is_terminal() {
                    break;
                }
                info!(state = ?*watch.borrow(), "push auth session");
            }
            () = tokio::time::sleep(Duration::from_secs(30)) => {
                println!("Waiting for approval ({} left)", format_mm_ss(countdown.remaining()));
            }
        }
    }

    let state = session.wait().await;
    countdown.pause();

    match state {
        PushAuthState::Success { token } => {
            let auth = AuthSession::establish(token);
            println!("Login approved.");
            if let Some(token) = auth.token() {
                println!("Token: {token}");
            }
            Ok(())
        }
        PushAuthState::TimedOut => Err(anyhow::anyhow!(
            "no approval arrived in time; the attempt has expired, request a new login"
        )),
        PushAuthState::Error { reason } => {
            Err(anyhow::anyhow!("push login failed: {reason}"))
        }
        state => Err(anyhow::anyhow!("push login ended early in state {state:?}")),
    }
}
