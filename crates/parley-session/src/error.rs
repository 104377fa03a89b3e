//! Error taxonomy for the session core.

use parley_common::{ParameterError, ParleyError, SessionStatus};

/// Failure reported by a [`BackendGateway`](crate::BackendGateway) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The channel to the backend broke (process exited, pipe closed, bad frame).
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend rejected the request, e.g. model file not found.
    #[error("backend error: {0}")]
    Backend(String),
    /// Generation started but did not complete.
    #[error("generation failed: {0}")]
    Generation(String),
}

/// An intent that is not allowed in the current session state.
///
/// Views are expected to prevent these; the controller still rejects
/// them without touching state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardViolation {
    #[error("cannot load a model while a response is being generated")]
    LoadWhileGenerating,
    #[error("a model is already loading")]
    LoadInProgress,
    #[error("cannot submit a prompt while {0}")]
    NotReady(SessionStatus),
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("no generation is running")]
    NotGenerating,
    #[error("cannot clear the session while a response is being generated")]
    ClearWhileGenerating,
    #[error("invalid inference parameters: {0}")]
    InvalidParameters(#[from] ParameterError),
}

/// The error value surfaced to views after a failed operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load model {path}: {source}")]
    Load { path: String, source: GatewayError },
    #[error("inference failed: {0}")]
    Inference(GatewayError),
}

/// The session runtime has stopped and no longer accepts intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session runtime is closed")]
pub struct SessionClosed;

impl From<GatewayError> for ParleyError {
    fn from(err: GatewayError) -> Self {
        ParleyError::Backend(err.to_string())
    }
}

impl From<SessionClosed> for ParleyError {
    fn from(err: SessionClosed) -> Self {
        ParleyError::Session(err.to_string())
    }
}
