//! Intent handlers. Each one checks its guard before touching state, so a
//! rejected intent leaves the store exactly as it was.

use std::sync::Arc;

use futures_util::FutureExt;
use parley_common::{
    new_correlation_id, ConversationEntry, InferenceParameters, SessionEvent, SessionStatus,
};
use tracing::{debug, info};

use super::types::{ActiveCall, CallKind, Intent, PendingCall};
use super::SessionController;
use crate::error::GuardViolation;
use crate::gateway::BackendGateway;

impl<G: BackendGateway> SessionController<G> {
    /// Dispatch an intent. Returns the gateway call to drive, if one was issued.
    pub fn handle_intent(&mut self, intent: Intent) -> Result<Option<PendingCall>, GuardViolation> {
        match intent {
            Intent::SubmitPrompt(text) => self.submit_prompt(text).map(Some),
            Intent::LoadModel(path) => self.load_model(path).map(Some),
            Intent::Cancel => self.cancel().map(|_| None),
            Intent::SetDraftPrompt(text) => {
                self.set_draft_prompt(text);
                Ok(None)
            }
            Intent::SetParameters(params) => self.set_parameters(params).map(|_| None),
            Intent::ClearSession => self.clear_session().map(|_| None),
        }
    }

    pub fn load_model(&mut self, path: String) -> Result<PendingCall, GuardViolation> {
        match self.store.status() {
            SessionStatus::Generating => return Err(GuardViolation::LoadWhileGenerating),
            SessionStatus::ModelLoading { .. } => return Err(GuardViolation::LoadInProgress),
            SessionStatus::ModelUnloaded | SessionStatus::Ready => {}
        }

        let request_id = new_correlation_id();
        info!(%path, %request_id, "Loading model");

        self.store.set_status(SessionStatus::ModelLoading { progress: 0.0 });
        self.store.reset_load_progress();
        self.store.set_error(None);
        self.active = Some(ActiveCall {
            kind: CallKind::LoadModel,
            request_id: request_id.clone(),
            path: Some(path.clone()),
        });
        self.events
            .publish(SessionEvent::ModelLoadStarted { path: path.clone() });

        let gateway = Arc::clone(&self.gateway);
        let future = async move { gateway.load_model(&path).await }.boxed();
        Ok(PendingCall {
            kind: CallKind::LoadModel,
            request_id,
            future,
        })
    }

    /// Start a generation for `prompt` with the parameters in effect now.
    pub fn submit_prompt(&mut self, prompt: String) -> Result<PendingCall, GuardViolation> {
        let status = self.store.status();
        if !status.accepts_prompt() {
            return Err(GuardViolation::NotReady(status));
        }
        if prompt.trim().is_empty() {
            return Err(GuardViolation::EmptyPrompt);
        }

        // Later parameter edits must not reach this generation.
        let params = self.store.parameters().clone();
        let request_id = new_correlation_id();
        debug!(%request_id, chars = prompt.len(), "Submitting prompt");

        self.store.set_status(SessionStatus::Generating);
        self.store.push_entry(ConversationEntry::user(prompt.clone()));
        self.store.clear_draft_prompt();
        self.store.push_entry(ConversationEntry::pending_assistant());
        self.store.set_cancel_requested(false);
        self.store.set_error(None);
        self.store.stats_mut().start();
        self.active = Some(ActiveCall {
            kind: CallKind::Inference,
            request_id: request_id.clone(),
            path: None,
        });
        self.events.publish(SessionEvent::GenerationStarted {
            request_id: request_id.clone(),
        });

        let gateway = Arc::clone(&self.gateway);
        let future = async move { gateway.run_inference(&prompt, &params).await }.boxed();
        Ok(PendingCall {
            kind: CallKind::Inference,
            request_id,
            future,
        })
    }

    /// Ask the backend to stop the running generation. The generation
    /// still ends only when its call resolves.
    pub fn cancel(&mut self) -> Result<(), GuardViolation> {
        if !self.store.status().is_generating() {
            return Err(GuardViolation::NotGenerating);
        }

        self.gateway.request_cancel();
        if self.store.cancel_requested() {
            debug!("cancel already requested, resent");
            return Ok(());
        }

        self.store.set_cancel_requested(true);
        let request_id = self.active_request_id().unwrap_or_default().to_string();
        info!(%request_id, "Cancel requested");
        self.events
            .publish(SessionEvent::CancelRequested { request_id });
        Ok(())
    }

    pub fn set_draft_prompt(&mut self, text: String) {
        self.store.set_draft_prompt(text);
    }

    /// Replace the parameters used by the next submission.
    pub fn set_parameters(&mut self, params: InferenceParameters) -> Result<(), GuardViolation> {
        let params = params.normalized();
        params.validate()?;
        debug!(?params, "Inference parameters updated");
        self.store.set_parameters(params);
        Ok(())
    }

    /// Drop the conversation history. The loaded model stays loaded.
    pub fn clear_session(&mut self) -> Result<(), GuardViolation> {
        if self.store.status().is_generating() {
            return Err(GuardViolation::ClearWhileGenerating);
        }
        self.store.clear_history();
        info!("Session cleared");
        self.events.publish(SessionEvent::SessionCleared);
        Ok(())
    }
}
