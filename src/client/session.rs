//! Session driver for the push auth state machine.
//!
//! Owns the event stream and the wait timeout for one session. The channel
//! and the timeout are acquired together and released together: every exit
//! path (success, error, timeout, explicit disconnect, drop) runs the same
//! teardown.

use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::machine::{PushAuthEvent, PushAuthState, transition};

/// Wait timeout matching the attempt TTL, so the countdown shown to the user
/// and the connection timeout expire together.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct PushAuthSession {
    state_rx: watch::Receiver<PushAuthState>,
    cancel: CancellationToken,
}

impl PushAuthSession {
    /// Drive a session over an already-opened event stream.
    ///
    /// The stream is consumed by a background task; reaching a terminal
    /// state drops the stream (closing the channel) before the state is
    /// published, so callers can tear down without double-closing.
    pub fn spawn<S>(events: S, timeout: Duration) -> Self
    where
        S: Stream<Item = PushAuthEvent> + Send + Unpin + 'static,
    {
        let (state_tx, state_rx) = watch::channel(PushAuthState::Connecting);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut events = events;
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);
            let mut state = PushAuthState::Connecting;

            let terminal = loop {
                // Cancellation first, then the timeout: a timeout that fires
                // together with a late channel event always wins.
                let event = tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break None,
                    () = &mut deadline => PushAuthEvent::TimeoutElapsed,
                    next = events.next() => next.unwrap_or(PushAuthEvent::ChannelClosed),
                };

                let next = transition(&state, &event);
                if next == state {
                    continue;
                }
                debug!(from = ?state, to = ?next, "push auth transition");
                state = next;
                if state.is_terminal() {
                    break Some(state);
                }
                let _ = state_tx.send(state.clone());
            };

            // Close the channel before publishing a terminal state.
            drop(events);
            if let Some(terminal) = terminal {
                let _ = state_tx.send(terminal);
            }
        });

        Self { state_rx, cancel }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> PushAuthState {
        self.state_rx.borrow().clone()
    }

    /// Watch state changes; useful for display layers.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PushAuthState> {
        self.state_rx.clone()
    }

    /// Wait for the first terminal state.
    ///
    /// Returns the current (non-terminal) state if the session was
    /// disconnected before reaching one.
    pub async fn wait(&self) -> PushAuthState {
        let mut state_rx = self.state_rx.clone();
        match state_rx.wait_for(PushAuthState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Tear the session down: close the channel and cancel the timeout.
    ///
    /// Safe to call from any state, including before the connection
    /// completes, and idempotent. A success arriving concurrently is
    /// dropped whole; its token is simply never surfaced.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushAuthSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
