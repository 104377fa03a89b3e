//! Intents sent by views and the calls the controller hands to the runtime.

use std::fmt;

use futures_util::future::BoxFuture;
use parley_common::InferenceParameters;

use crate::error::GatewayError;

/// A user action forwarded by a view.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SubmitPrompt(String),
    Cancel,
    LoadModel(String),
    SetDraftPrompt(String),
    SetParameters(InferenceParameters),
    ClearSession,
}

/// Which gateway call a [`PendingCall`] is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    LoadModel,
    Inference,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::LoadModel => write!(f, "load_model"),
            CallKind::Inference => write!(f, "run_inference"),
        }
    }
}

/// An issued gateway call. The runtime polls `future` and reports its
/// result back through [`SessionController::complete`](super::SessionController::complete).
pub struct PendingCall {
    pub kind: CallKind,
    pub request_id: String,
    pub future: BoxFuture<'static, Result<(), GatewayError>>,
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("kind", &self.kind)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// The call the controller is currently waiting on.
#[derive(Debug, Clone)]
pub(super) struct ActiveCall {
    pub kind: CallKind,
    pub request_id: String,
    /// Model path, for loads.
    pub path: Option<String>,
}
