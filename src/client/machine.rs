//! Initiator-side push auth state machine.
//!
//! Channel and timer activity is reduced to an event enum consumed by one
//! pure transition function, so every transition is testable with a scripted
//! event sequence instead of a live stream.

/// Client-side state of one waiting session. Not persisted; it lives for the
/// duration of the session and dies with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAuthState {
    /// Channel requested, open confirmation not yet seen.
    Connecting,
    /// Channel open, waiting for the terminal event.
    Waiting,
    /// Terminal: the login was approved and the token extracted.
    Success { token: String },
    /// Terminal: transport failure or malformed terminal payload.
    Error { reason: String },
    /// Terminal: no terminal event arrived inside the wait window. The
    /// attempt is expired server-side; a retry must start a new attempt.
    TimedOut,
}

impl PushAuthState {
    /// Terminal states absorb all further events except an explicit retry.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. } | Self::TimedOut)
    }
}

/// Everything that can happen to a waiting session.
#[derive(Debug, Clone)]
pub enum PushAuthEvent {
    /// The channel confirmed it is open.
    Opened,
    /// The named terminal event arrived; `None` means the payload carried no
    /// token.
    LoginSuccess { token: Option<String> },
    /// Transport-level failure.
    ChannelError { message: String },
    /// The stream ended without a terminal event.
    ChannelClosed,
    /// The session's own timeout fired. Independent of the channel, and it
    /// beats any channel event that arrives after it.
    TimeoutElapsed,
    /// Explicit retry from an error or timeout; the driver re-invokes from
    /// scratch (new channel, new timeout arm).
    Retry,
}

/// The single transition function.
#[must_use]
pub fn transition(state: &PushAuthState, event: &PushAuthEvent) -> PushAuthState {
    if state.is_terminal() {
        return match (state, event) {
            (PushAuthState::Error { .. } | PushAuthState::TimedOut, PushAuthEvent::Retry) => {
                PushAuthState::Connecting
            }
            _ => state.clone(),
        };
    }

    match event {
        PushAuthEvent::Opened => PushAuthState::Waiting,
        PushAuthEvent::LoginSuccess { token: Some(token) } => PushAuthState::Success {
            token: token.clone(),
        },
        PushAuthEvent::LoginSuccess { token: None } => PushAuthState::Error {
            reason: "login event carried no token".to_string(),
        },
        PushAuthEvent::ChannelError { message } => PushAuthState::Error {
            reason: message.clone(),
        },
        PushAuthEvent::ChannelClosed => PushAuthState::Error {
            reason: "notification channel closed".to_string(),
        },
        PushAuthEvent::TimeoutElapsed => PushAuthState::TimedOut,
        PushAuthEvent::Retry => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(token: &str) -> PushAuthEvent {
        PushAuthEvent::LoginSuccess {
            token: Some(token.to_string()),
        }
    }

    #[test]
    fn connecting_opens_into_waiting() {
        let state = transition(&PushAuthState::Connecting, &PushAuthEvent::Opened);
        assert_eq!(state, PushAuthState::Waiting);
    }

    #[test]
    fn success_reachable_from_connecting_and_waiting() {
        for from in [PushAuthState::Connecting, PushAuthState::Waiting] {
            let state = transition(&from, &success("abc"));
            assert_eq!(
                state,
                PushAuthState::Success {
                    token: "abc".to_string()
                }
            );
        }
    }

    #[test]
    fn missing_token_is_an_error_not_a_success() {
        let state = transition(
            &PushAuthState::Waiting,
            &PushAuthEvent::LoginSuccess { token: None },
        );
        assert!(matches!(state, PushAuthState::Error { .. }));
    }

    #[test]
    fn channel_error_and_close_are_errors() {
        let state = transition(
            &PushAuthState::Connecting,
            &PushAuthEvent::ChannelError {
                message: "connection refused".to_string(),
            },
        );
        assert_eq!(
            state,
            PushAuthState::Error {
                reason: "connection refused".to_string()
            }
        );

        let state = transition(&PushAuthState::Waiting, &PushAuthEvent::ChannelClosed);
        assert!(matches!(state, PushAuthState::Error { .. }));
    }

    #[test]
    fn timeout_from_connecting_and_waiting() {
        for from in [PushAuthState::Connecting, PushAuthState::Waiting] {
            assert_eq!(
                transition(&from, &PushAuthEvent::TimeoutElapsed),
                PushAuthState::TimedOut
            );
        }
    }

    #[test]
    fn timeout_beats_a_late_success() {
        let timed_out = transition(&PushAuthState::Waiting, &PushAuthEvent::TimeoutElapsed);
        let after = transition(&timed_out, &success("abc"));
        assert_eq!(after, PushAuthState::TimedOut);
    }

    #[test]
    fn success_absorbs_every_later_event() {
        let state = PushAuthState::Success {
            token: "abc".to_string(),
        };
        for event in [
            PushAuthEvent::Opened,
            success("def"),
            PushAuthEvent::ChannelError {
                message: "late".to_string(),
            },
            PushAuthEvent::ChannelClosed,
            PushAuthEvent::TimeoutElapsed,
            PushAuthEvent::Retry,
        ] {
            assert_eq!(transition(&state, &event), state);
        }
    }

    #[test]
    fn retry_restarts_from_error_and_timeout_only() {
        let error = PushAuthState::Error {
            reason: "boom".to_string(),
        };
        assert_eq!(
            transition(&error, &PushAuthEvent::Retry),
            PushAuthState::Connecting
        );
        assert_eq!(
            transition(&PushAuthState::TimedOut, &PushAuthEvent::Retry),
            PushAuthState::Connecting
        );

        // Retry is a no-op anywhere else.
        assert_eq!(
            transition(&PushAuthState::Waiting, &PushAuthEvent::Retry),
            PushAuthState::Waiting
        );
    }

    #[test]
    fn scripted_happy_path() {
        let mut state = PushAuthState::Connecting;
        for event in [PushAuthEvent::Opened, success("abc")] {
            state = transition(&state, &event);
        }
        assert_eq!(
            state,
            PushAuthState::Success {
                token: "abc".to_string()
            }
        );
    }
}
