//! Notification channel registry.
//!
//! One waiting initiator holds at most one open channel, keyed by the
//! attempt's `request_id`. A channel delivers at most one terminal message
//! (the `oneshot` makes that structural) and is consumed by delivery. If no
//! channel is open when an approval lands, the message is simply dropped;
//! verification has already succeeded server-side.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

/// Terminal payload pushed to a waiting initiator.
#[derive(Debug)]
pub enum ChannelMessage {
    LoginSuccess { token: String },
    Error { message: String },
}

struct ChannelEntry {
    sender: oneshot::Sender<ChannelMessage>,
    registered_at: Instant,
}

pub struct ChannelRegistry {
    ttl: Duration,
    channels: Mutex<HashMap<String, ChannelEntry>>,
}

impl ChannelRegistry {
    /// `ttl` bounds how long an unanswered subscription is kept around;
    /// it matches the attempt TTL, after which no terminal event can come.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Open the channel for a request id, replacing any previous one.
    ///
    /// The replaced sender is dropped, which closes the stale stream on the
    /// old subscriber's side.
    pub async fn subscribe(&self, request_id: &str) -> oneshot::Receiver<ChannelMessage> {
        let (tx, rx) = oneshot::channel();
        let mut channels = self.channels.lock().await;
        channels.retain(|_, entry| entry.registered_at.elapsed() < self.ttl);
        channels.insert(
            request_id.to_string(),
            ChannelEntry {
                sender: tx,
                registered_at: Instant::now(),
            },
        );
        rx
    }

    /// Route a login-success token to the open channel, if any.
    ///
    /// Returns whether the message was actually delivered.
    pub async fn notify_success(&self, request_id: &str, token: String) -> bool {
        self.notify(request_id, ChannelMessage::LoginSuccess { token })
            .await
    }

    /// Route a stream-level error to the open channel, if any.
    pub async fn notify_error(&self, request_id: &str, message: String) -> bool {
        self.notify(request_id, ChannelMessage::Error { message }).await
    }

    async fn notify(&self, request_id: &str, message: ChannelMessage) -> bool {
        let entry = {
            let mut channels = self.channels.lock().await;
            channels.remove(request_id)
        };
        match entry {
            Some(entry) => {
                let delivered = entry.sender.send(message).is_ok();
                if !delivered {
                    // Receiver already dropped: the initiator navigated away.
                    debug!(request_id, "notification channel receiver gone");
                }
                delivered
            }
            None => {
                debug!(request_id, "no open notification channel");
                false
            }
        }
    }

    /// Drop the channel for a request id without sending anything.
    pub async fn remove(&self, request_id: &str) {
        self.channels.lock().await.remove(request_id);
    }

    /// Drop subscriptions older than the TTL. Called by the sweeper.
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.lock().await;
        let before = channels.len();
        channels.retain(|_, entry| entry.registered_at.elapsed() < self.ttl);
        before - channels.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.channels.lock().await.len()
    }
}
