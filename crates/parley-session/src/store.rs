//! Session state store: conversation history, draft prompt, model
//! readiness, and load progress. Pure data plus mutations, no I/O.
//!
//! Only the controller writes to the store. Views receive immutable
//! [`SessionSnapshot`]s.

use chrono::Utc;
use parley_common::{ConversationEntry, InferenceParameters, SessionId, SessionStatus};

use crate::error::SessionError;
use crate::stats::{GenerationStats, StatsTracker};

/// Read-only projection of the store handed to views.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub history: Vec<ConversationEntry>,
    pub status: SessionStatus,
    pub draft_prompt: String,
    /// Progress of the current or last model load, in `[0, 1]`.
    pub load_progress: f32,
    pub load_message: Option<String>,
    pub parameters: InferenceParameters,
    pub model_path: Option<String>,
    pub last_error: Option<SessionError>,
    pub cancel_requested: bool,
    pub last_generation: Option<GenerationStats>,
    pub total_tokens: u64,
    /// Increments on every mutation; equal revisions mean equal state.
    pub revision: u64,
}

impl SessionSnapshot {
    /// The trailing assistant entry while it is still streaming.
    pub fn pending_entry(&self) -> Option<&ConversationEntry> {
        self.history.last().filter(|e| e.is_pending_assistant())
    }
}

#[derive(Debug)]
pub struct SessionStore {
    session_id: SessionId,
    history: Vec<ConversationEntry>,
    status: SessionStatus,
    draft_prompt: String,
    load_progress: f32,
    load_message: Option<String>,
    parameters: InferenceParameters,
    model_path: Option<String>,
    last_error: Option<SessionError>,
    cancel_requested: bool,
    stats: StatsTracker,
    revision: u64,
}

impl SessionStore {
    pub fn new(parameters: InferenceParameters) -> Self {
        Self {
            session_id: SessionId::new(),
            history: Vec::new(),
            status: SessionStatus::ModelUnloaded,
            draft_prompt: String::new(),
            load_progress: 0.0,
            load_message: None,
            parameters,
            model_path: None,
            last_error: None,
            cancel_requested: false,
            stats: StatsTracker::new(),
            revision: 0,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            self.status = status;
            self.touch();
        }
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    pub fn draft_prompt(&self) -> &str {
        &self.draft_prompt
    }

    pub fn set_draft_prompt(&mut self, text: String) {
        if self.draft_prompt != text {
            self.draft_prompt = text;
            self.touch();
        }
    }

    pub fn clear_draft_prompt(&mut self) {
        self.set_draft_prompt(String::new());
    }

    pub fn parameters(&self) -> &InferenceParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: InferenceParameters) {
        self.parameters = parameters;
        self.touch();
    }

    pub fn load_progress(&self) -> f32 {
        self.load_progress
    }

    /// Record load progress; mirrored into the status while loading.
    pub fn set_load_progress(&mut self, progress: f32, message: Option<String>) {
        self.load_progress = progress;
        if message.is_some() {
            self.load_message = message;
        }
        if let SessionStatus::ModelLoading { .. } = self.status {
            self.status = SessionStatus::ModelLoading { progress };
        }
        self.touch();
    }

    pub fn reset_load_progress(&mut self) {
        self.load_progress = 0.0;
        self.load_message = None;
        self.touch();
    }

    pub fn model_path(&self) -> Option<&str> {
        self.model_path.as_deref()
    }

    pub fn set_model_path(&mut self, path: Option<String>) {
        self.model_path = path;
        self.touch();
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn set_error(&mut self, error: Option<SessionError>) {
        self.last_error = error;
        self.touch();
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn set_cancel_requested(&mut self, requested: bool) {
        if self.cancel_requested != requested {
            self.cancel_requested = requested;
            self.touch();
        }
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatsTracker {
        &mut self.stats
    }

    /// Append a finished entry or the placeholder for a new generation.
    pub fn push_entry(&mut self, entry: ConversationEntry) {
        debug_assert!(
            self.pending_entry().is_none(),
            "a pending entry must be finalized before appending"
        );
        self.history.push(entry);
        self.touch();
    }

    /// The trailing assistant entry, if it is still streaming.
    pub fn pending_entry(&self) -> Option<&ConversationEntry> {
        self.history.last().filter(|e| e.is_pending_assistant())
    }

    /// Append a token to the trailing pending entry.
    ///
    /// Returns `false` (leaving history untouched) if there is no pending
    /// entry, e.g. for a token that arrives after finalization.
    pub fn append_to_pending(&mut self, token: &str) -> bool {
        match self.history.last_mut() {
            Some(entry) if entry.is_pending_assistant() => {
                entry.content.push_str(token);
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Mark the trailing pending entry as complete, keeping whatever
    /// content has accumulated. Returns `false` if nothing was pending.
    pub fn finalize_pending(&mut self, error: Option<String>, cancelled: bool) -> bool {
        match self.history.last_mut() {
            Some(entry) if entry.is_pending_assistant() => {
                entry.pending = false;
                entry.timestamp = Utc::now();
                entry.error = error;
                entry.cancelled = cancelled;
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Start a fresh conversation. Keeps the loaded model and parameters.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.session_id = SessionId::new();
        self.last_error = None;
        self.stats.reset();
        self.touch();
    }

    /// At most one entry is pending, and only as the trailing assistant entry.
    pub fn check_invariant(&self) -> Result<(), String> {
        let last = self.history.len().saturating_sub(1);
        for (index, entry) in self.history.iter().enumerate() {
            if !entry.pending {
                continue;
            }
            if index != last {
                return Err(format!("entry {index} is pending but not the last entry"));
            }
            if !entry.is_pending_assistant() {
                return Err(format!("pending entry {index} is not an assistant entry"));
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            history: self.history.clone(),
            status: self.status,
            draft_prompt: self.draft_prompt.clone(),
            load_progress: self.load_progress,
            load_message: self.load_message.clone(),
            parameters: self.parameters.clone(),
            model_path: self.model_path.clone(),
            last_error: self.last_error.clone(),
            cancel_requested: self.cancel_requested,
            last_generation: self.stats.last(),
            total_tokens: self.stats.total_tokens(),
            revision: self.revision,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(InferenceParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_common::Sender;

    fn store_with_pending() -> SessionStore {
        let mut store = SessionStore::default();
        store.push_entry(ConversationEntry::user("Hi"));
        store.push_entry(ConversationEntry::pending_assistant());
        store
    }

    #[test]
    fn new_store_is_empty_and_unloaded() {
        let store = SessionStore::default();
        assert!(store.history().is_empty());
        assert_eq!(store.status(), SessionStatus::ModelUnloaded);
        assert_eq!(store.load_progress(), 0.0);
        assert!(store.check_invariant().is_ok());
    }

    #[test]
    fn tokens_append_to_trailing_pending_entry() {
        let mut store = store_with_pending();
        assert!(store.append_to_pending("He"));
        assert!(store.append_to_pending("llo"));

        let last = store.history().last().unwrap();
        assert_eq!(last.content, "Hello");
        assert!(last.pending);
        assert!(store.check_invariant().is_ok());
    }

    #[test]
    fn finalize_keeps_content_and_clears_pending() {
        let mut store = store_with_pending();
        store.append_to_pending("Yo");
        assert!(store.finalize_pending(None, false));

        let last = store.history().last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.content, "Yo");
        assert!(!last.pending);
        assert!(store.pending_entry().is_none());
    }

    #[test]
    fn stray_token_after_finalize_is_dropped() {
        let mut store = store_with_pending();
        store.append_to_pending("done");
        store.finalize_pending(None, false);
        let before = store.history().to_vec();
        let revision = store.revision();

        assert!(!store.append_to_pending("late"));
        assert_eq!(store.history(), before.as_slice());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn token_never_lands_on_user_entry() {
        let mut store = SessionStore::default();
        store.push_entry(ConversationEntry::user("Hi"));
        assert!(!store.append_to_pending("x"));
        assert_eq!(store.history()[0].content, "Hi");
    }

    #[test]
    fn finalize_records_error() {
        let mut store = store_with_pending();
        store.finalize_pending(Some("backend error: oom".into()), true);
        let last = store.history().last().unwrap();
        assert_eq!(last.error.as_deref(), Some("backend error: oom"));
        assert!(last.cancelled);
        assert!(last.content.is_empty());
    }

    #[test]
    fn invariant_detects_misplaced_pending_entry() {
        let mut store = SessionStore::default();
        store.history.push(ConversationEntry::pending_assistant());
        store.history.push(ConversationEntry::user("oops"));
        assert!(store.check_invariant().is_err());

        let mut store = SessionStore::default();
        let mut entry = ConversationEntry::user("x");
        entry.pending = true;
        store.history.push(entry);
        assert!(store.check_invariant().is_err());
    }

    #[test]
    fn load_progress_mirrors_into_loading_status() {
        let mut store = SessionStore::default();
        store.set_status(SessionStatus::ModelLoading { progress: 0.0 });
        store.set_load_progress(0.7, Some("tensors".into()));
        assert_eq!(store.status(), SessionStatus::ModelLoading { progress: 0.7 });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.load_progress, 0.7);
        assert_eq!(snapshot.load_message.as_deref(), Some("tensors"));
    }

    #[test]
    fn clear_history_starts_new_session() {
        let mut store = store_with_pending();
        store.finalize_pending(None, false);
        let old_id = store.snapshot().session_id;

        store.clear_history();
        let snapshot = store.snapshot();
        assert!(snapshot.history.is_empty());
        assert_ne!(snapshot.session_id, old_id);
    }

    #[test]
    fn revision_tracks_mutations() {
        let mut store = SessionStore::default();
        let r0 = store.revision();
        store.set_draft_prompt("a".into());
        assert!(store.revision() > r0);

        let r1 = store.revision();
        store.set_draft_prompt("a".into());
        assert_eq!(store.revision(), r1);
    }
}
