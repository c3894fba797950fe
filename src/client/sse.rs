//! Live notification channel: an SSE stream mapped to machine events.

use futures::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use sse_stream::{Sse, SseStream};
use tracing::debug;

use crate::client::machine::PushAuthEvent;

/// Named SSE event carrying the terminal login payload.
const LOGIN_SUCCESS_EVENT: &str = "login-success";

/// Open the notification channel and return the session's event stream.
///
/// The stream emits `Opened` once the server accepts the request, then maps
/// each SSE frame: the `login-success` event becomes the terminal payload,
/// keep-alive/open frames are skipped, transport errors become
/// `ChannelError`, and stream end becomes `ChannelClosed`. Connection
/// failures surface as an immediate `ChannelError` so the state machine
/// handles every failure the same way.
pub(crate) fn open_event_stream(
    client: reqwest::Client,
    url: String,
) -> BoxStream<'static, PushAuthEvent> {
    futures::stream::once(async move {
        let response = match client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return futures::stream::once(async move {
                    PushAuthEvent::ChannelError {
                        message: format!("connection failed: {err}"),
                    }
                })
                .boxed();
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            return futures::stream::once(async move {
                PushAuthEvent::ChannelError {
                    message: format!("notification channel returned status {status}"),
                }
            })
            .boxed();
        }

        let frames = SseStream::from_byte_stream(response.bytes_stream())
            .filter_map(|frame| async move { frame_event(frame) });

        futures::stream::once(async { PushAuthEvent::Opened })
            .chain(frames)
            .chain(futures::stream::once(async { PushAuthEvent::ChannelClosed }))
            .boxed()
    })
    .flatten()
    .boxed()
}

/// Map one SSE frame to a machine event; `None` skips the frame.
fn frame_event(frame: Result<Sse, sse_stream::Error>) -> Option<PushAuthEvent> {
    let frame = match frame {
        Ok(frame) => frame,
        Err(err) => {
            return Some(PushAuthEvent::ChannelError {
                message: format!("notification stream error: {err}"),
            });
        }
    };

    if frame.event.as_deref() != Some(LOGIN_SUCCESS_EVENT) {
        // Open signals and keep-alives are not terminal payloads.
        debug!(event = ?frame.event, "skipping non-terminal sse frame");
        return None;
    }

    let Some(data) = frame.data.as_deref() else {
        return Some(PushAuthEvent::LoginSuccess { token: None });
    };
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(payload) => Some(PushAuthEvent::LoginSuccess {
            token: payload
                .get("token")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        }),
        Err(_) => Some(PushAuthEvent::ChannelError {
            message: "failed to parse login payload".to_string(),
        }),
    }
}
