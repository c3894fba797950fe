//! Aprobo: push authentication and cross-device login approval.
//!
//! An unauthenticated device requests a login by email and waits on a
//! server-sent event channel while showing a one-time code; the account
//! owner approves the attempt from a trusted device by entering that code,
//! which delivers an authentication token to the waiting device.

pub mod api;
pub mod cli;
pub mod client;
pub mod push;

pub use api::{APP_USER_AGENT, GIT_COMMIT_HASH};
