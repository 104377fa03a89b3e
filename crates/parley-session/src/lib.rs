//! Inference session core for Parley.
//!
//! Drives a local language model through a backend gateway:
//! - Model lifecycle (load, progress, readiness)
//! - One in-flight prompt at a time, streamed token by token into history
//! - Advisory cancellation of a running generation
//! - Immutable snapshots and session events for views

pub mod controller;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod runtime;
pub mod stats;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{CallKind, Intent, PendingCall, SessionController};
pub use error::{GatewayError, GuardViolation, SessionClosed, SessionError};
pub use gateway::{BackendGateway, GatewayEvents, InferenceToken, IpcGateway, ModelLoadProgress};
pub use prompt::PromptTemplate;
pub use runtime::{spawn_session, RuntimeOptions, SessionHandle};
pub use stats::{GenerationStats, StatsTracker};
pub use store::{SessionSnapshot, SessionStore};
