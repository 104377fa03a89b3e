//! Boundary to the external inference backend.
//!
//! A gateway issues the three backend calls and hands out the two push
//! event streams. It owns no session state; it only translates between
//! the controller and whatever transport reaches the backend.

mod ipc;
pub mod protocol;


use async_trait::async_trait;
use parley_common::InferenceParameters;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayError;

pub use ipc::IpcGateway;

/// Payload of the `on_model_load_progress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLoadProgress {
    /// Fraction loaded, in `[0, 1]`.
    pub progress: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of the `on_inference_token` event: an incremental text
/// fragment, not necessarily a whole word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceToken {
    pub token: String,
}

/// The two consumable event streams of a gateway.
///
/// Events of one operation arrive in production order and are all sent
/// before that operation's call resolves.
pub struct GatewayEvents {
    pub progress: mpsc::UnboundedReceiver<ModelLoadProgress>,
    pub tokens: mpsc::UnboundedReceiver<InferenceToken>,
}

/// Sending halves that a gateway implementation pushes events into.
#[derive(Clone)]
pub struct GatewayEventSink {
    progress: mpsc::UnboundedSender<ModelLoadProgress>,
    tokens: mpsc::UnboundedSender<InferenceToken>,
}

impl GatewayEvents {
    pub fn channel() -> (GatewayEventSink, GatewayEvents) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (tokens_tx, tokens_rx) = mpsc::unbounded_channel();
        (
            GatewayEventSink {
                progress: progress_tx,
                tokens: tokens_tx,
            },
            GatewayEvents {
                progress: progress_rx,
                tokens: tokens_rx,
            },
        )
    }

    /// Take every progress event already delivered, without waiting.
    pub fn drain_progress(&mut self) -> Vec<ModelLoadProgress> {
        let mut drained = Vec::new();
        while let Ok(event) = self.progress.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Take every token already delivered, without waiting.
    pub fn drain_tokens(&mut self) -> Vec<InferenceToken> {
        let mut drained = Vec::new();
        while let Ok(token) = self.tokens.try_recv() {
            drained.push(token);
        }
        drained
    }
}

impl GatewayEventSink {
    /// Returns `false` once the receiving side is gone.
    pub fn progress(&self, event: ModelLoadProgress) -> bool {
        self.progress.send(event).is_ok()
    }

    /// Returns `false` once the receiving side is gone.
    pub fn token(&self, token: InferenceToken) -> bool {
        self.tokens.send(token).is_ok()
    }
}

#[async_trait]
pub trait BackendGateway: Send + Sync + 'static {
    /// Resolves once the backend has finished loading (or failed to load).
    async fn load_model(&self, path: &str) -> Result<(), GatewayError>;

    /// Resolves once the full response has been produced, or generation
    /// was cancelled or failed. Tokens are pushed to the event stream first.
    async fn run_inference(
        &self,
        prompt: &str,
        params: &InferenceParameters,
    ) -> Result<(), GatewayError>;

    /// Ask the backend to stop generating. Advisory only: more tokens may
    /// still arrive before the running call resolves.
    fn request_cancel(&self);

    /// Hand out the event streams. Returns `None` after the first call.
    fn take_events(&self) -> Option<GatewayEvents>;
}
