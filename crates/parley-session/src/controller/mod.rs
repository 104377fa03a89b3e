//! Inference session controller.
//!
//! The controller is the only writer of the [`SessionStore`]. It applies
//! intents under the state machine guards, issues gateway calls, folds
//! gateway events into the history and finalizes each call when it
//! resolves. It never awaits anything itself: issued calls are returned
//! as [`PendingCall`]s for the runtime to drive, so every handler runs to
//! completion before the next one starts.

mod intents;
mod types;


use std::sync::Arc;

use parley_common::{EventBus, InferenceParameters, SessionEvent, SessionStatus};
use tracing::{debug, info, trace, warn};

use crate::error::{GatewayError, SessionError};
use crate::gateway::{BackendGateway, InferenceToken, ModelLoadProgress};
use crate::store::{SessionSnapshot, SessionStore};

pub use types::{CallKind, Intent, PendingCall};
use types::ActiveCall;

pub struct SessionController<G: BackendGateway> {
    gateway: Arc<G>,
    store: SessionStore,
    events: Arc<EventBus>,
    active: Option<ActiveCall>,
}

impl<G: BackendGateway> SessionController<G> {
    pub fn new(gateway: Arc<G>, parameters: InferenceParameters) -> Self {
        Self::with_event_bus(gateway, parameters, Arc::new(EventBus::default()))
    }

    pub fn with_event_bus(
        gateway: Arc<G>,
        parameters: InferenceParameters,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            gateway,
            store: SessionStore::new(parameters.normalized()),
            events,
            active: None,
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn status(&self) -> SessionStatus {
        self.store.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    /// Request id of the outstanding generation, if any.
    pub fn active_request_id(&self) -> Option<&str> {
        self.active.as_ref().map(|call| call.request_id.as_str())
    }

    pub fn on_model_load_progress(&mut self, event: ModelLoadProgress) {
        if !self.store.status().is_loading() {
            debug!(
                progress = event.progress,
                "dropping load progress outside of a load"
            );
            return;
        }
        if !event.progress.is_finite() {
            warn!("dropping non-finite load progress");
            return;
        }

        let progress = event.progress.clamp(0.0, 1.0);
        trace!(progress, message = ?event.message, "model load progress");
        self.store.set_load_progress(progress, event.message);
    }

    /// Append a streamed token to the trailing pending entry. Tokens that
    /// arrive when nothing is pending are dropped.
    pub fn on_inference_token(&mut self, event: InferenceToken) {
        if self.store.append_to_pending(&event.token) {
            self.store.stats_mut().record_token();
        } else {
            debug!(token = %event.token, "dropping token with no pending entry");
        }
        debug_assert!(self.store.check_invariant().is_ok());
    }

    /// Apply the outcome of the outstanding call of `kind`.
    pub fn complete(&mut self, kind: CallKind, result: Result<(), GatewayError>) {
        let active = match self.active.take() {
            Some(active) if active.kind == kind => active,
            other => {
                warn!(%kind, "completion for a call that is not outstanding");
                self.active = other;
                return;
            }
        };

        match kind {
            CallKind::LoadModel => self.finish_load(active, result),
            CallKind::Inference => self.finish_inference(active, result),
        }
        debug_assert!(self.store.check_invariant().is_ok());
    }

    fn finish_load(&mut self, active: ActiveCall, result: Result<(), GatewayError>) {
        let path = active.path.unwrap_or_default();
        match result {
            Ok(()) => {
                info!(%path, "Model loaded");
                self.store.set_status(SessionStatus::Ready);
                self.store.set_load_progress(1.0, None);
                self.store.set_model_path(Some(path.clone()));
                self.events.publish(SessionEvent::ModelLoaded { path });
            }
            Err(source) => {
                warn!(%path, error = %source, "Model failed to load");
                let message = source.to_string();
                self.store.set_status(SessionStatus::ModelUnloaded);
                self.store.set_model_path(None);
                self.store.set_error(Some(SessionError::Load {
                    path: path.clone(),
                    source,
                }));
                self.events
                    .publish(SessionEvent::ModelLoadFailed { path, message });
            }
        }
    }

    fn finish_inference(&mut self, active: ActiveCall, result: Result<(), GatewayError>) {
        let cancelled = self.store.cancel_requested();
        let error = result.as_ref().err().map(ToString::to_string);

        if !self.store.finalize_pending(error, cancelled) {
            warn!(request_id = %active.request_id, "generation resolved with no pending entry");
        }
        self.store.set_cancel_requested(false);
        self.store.set_status(SessionStatus::Ready);

        let stats = self.store.stats_mut().finish();
        let tokens = stats.map(|s| s.tokens).unwrap_or_default();

        match result {
            Ok(()) => {
                if let Some(stats) = stats {
                    info!(
                        request_id = %active.request_id,
                        tokens = stats.tokens,
                        elapsed_ms = stats.elapsed.as_millis() as u64,
                        tokens_per_second = %format!("{:.1}", stats.tokens_per_second()),
                        cancelled,
                        "Generation finished"
                    );
                }
                self.events.publish(SessionEvent::GenerationFinished {
                    request_id: active.request_id,
                    tokens,
                });
            }
            Err(e) => {
                warn!(request_id = %active.request_id, tokens, cancelled, error = %e, "Generation failed");
                let message = e.to_string();
                self.store.set_error(Some(SessionError::Inference(e)));
                self.events.publish(SessionEvent::GenerationFailed {
                    request_id: active.request_id,
                    message,
                });
            }
        }
    }
}
