//! Push authentication domain: attempts, client references, notification
//! channels, and the approval protocol.

pub mod channel;
pub mod models;
pub mod reference;
pub mod repo;
pub mod service;
pub mod store;
pub mod tokens;

pub use models::{AttemptStatus, PushAuthAttempt, VerifyFailure};
pub use reference::{ClientReference, ReferenceError};
pub use service::{ApprovalOutcome, PushAuthService, PushConfig};
pub use store::{AttemptStore, MemoryAttemptStore, VerifyOutcome};
