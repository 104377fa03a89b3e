//! Conversation and session data shared between the session core,
//! configuration, and views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ParameterError;

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One message in the conversation history.
///
/// Only the trailing assistant entry may be `pending`; its content grows
/// by appending streamed tokens until the generation call resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub pending: bool,
    /// Set when the generation that produced this entry failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the generation ended after a cancel was requested.
    #[serde(default)]
    pub cancelled: bool,
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            timestamp: Utc::now(),
            pending: false,
            error: None,
            cancelled: false,
        }
    }

    /// Empty assistant entry awaiting streamed tokens.
    pub fn pending_assistant() -> Self {
        Self {
            sender: Sender::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            pending: true,
            error: None,
            cancelled: false,
        }
    }

    pub fn is_pending_assistant(&self) -> bool {
        self.pending && self.sender == Sender::Assistant
    }
}

/// Lifecycle of the loaded model and the in-flight generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    ModelUnloaded,
    ModelLoading { progress: f32 },
    Ready,
    Generating,
}

impl SessionStatus {
    pub fn accepts_prompt(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, SessionStatus::Generating)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionStatus::ModelLoading { .. })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::ModelUnloaded => write!(f, "no model loaded"),
            SessionStatus::ModelLoading { progress } => {
                write!(f, "loading model ({:.0}%)", progress * 100.0)
            }
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Generating => write!(f, "generating"),
        }
    }
}

/// Sampling settings sent with every inference request.
///
/// Copied by value into each request, so edits made while a generation
/// is running only apply to the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceParameters {
    pub repeat_last_n: usize,
    /// `None` means no limit.
    pub max_token_count: Option<usize>,
    pub batch_size: usize,
    pub top_k: usize,
    pub top_p: f32,
    pub repeat_penalty: f32,
    #[serde(alias = "temp")]
    pub temperature: f32,
}

/// Highest sampling temperature accepted from config or at runtime.
pub const MAX_TEMPERATURE: f32 = 2.0;

impl Default for InferenceParameters {
    fn default() -> Self {
        Self {
            repeat_last_n: 64,
            max_token_count: None,
            batch_size: 8,
            top_k: 40,
            top_p: 0.95,
            repeat_penalty: 1.3,
            temperature: 0.8,
        }
    }
}

impl InferenceParameters {
    /// A token limit of zero is how the settings form spells "unlimited".
    pub fn normalized(mut self) -> Self {
        if self.max_token_count == Some(0) {
            self.max_token_count = None;
        }
        self
    }

    /// Reject values the backend cannot sample with.
    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, value) in [
            ("top_p", self.top_p),
            ("repeat_penalty", self.repeat_penalty),
            ("temperature", self.temperature),
        ] {
            if !value.is_finite() {
                return Err(ParameterError::NotFinite { name });
            }
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ParameterError::OutOfRange {
                name: "top_p",
                value: f64::from(self.top_p),
                min: 0.0,
                max: 1.0,
            });
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ParameterError::OutOfRange {
                name: "temperature",
                value: f64::from(self.temperature),
                min: 0.0,
                max: f64::from(MAX_TEMPERATURE),
            });
        }
        if self.repeat_penalty <= 0.0 {
            return Err(ParameterError::NotPositive {
                name: "repeat_penalty",
            });
        }
        if self.batch_size == 0 {
            return Err(ParameterError::NotPositive { name: "batch_size" });
        }
        if self.top_k == 0 {
            return Err(ParameterError::NotPositive { name: "top_k" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_entry_is_final() {
        let entry = ConversationEntry::user("Hi");
        assert_eq!(entry.sender, Sender::User);
        assert_eq!(entry.content, "Hi");
        assert!(!entry.pending);
        assert!(!entry.is_pending_assistant());
    }

    #[test]
    fn pending_assistant_entry_is_empty() {
        let entry = ConversationEntry::pending_assistant();
        assert_eq!(entry.sender, Sender::Assistant);
        assert!(entry.content.is_empty());
        assert!(entry.is_pending_assistant());
        assert!(entry.error.is_none());
    }

    #[test]
    fn entry_serialization_skips_missing_error() {
        let entry = ConversationEntry::user("hello");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"sender\":\"user\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn status_defaults_to_unloaded() {
        assert_eq!(SessionStatus::default(), SessionStatus::ModelUnloaded);
    }

    #[test]
    fn only_ready_accepts_prompts() {
        assert!(SessionStatus::Ready.accepts_prompt());
        assert!(!SessionStatus::Generating.accepts_prompt());
        assert!(!SessionStatus::ModelUnloaded.accepts_prompt());
        assert!(!SessionStatus::ModelLoading { progress: 0.5 }.accepts_prompt());
    }

    #[test]
    fn status_display() {
        assert_eq!(SessionStatus::Ready.to_string(), "ready");
        assert_eq!(
            SessionStatus::ModelLoading { progress: 0.3 }.to_string(),
            "loading model (30%)"
        );
    }

    #[test]
    fn status_serialization_is_tagged() {
        let json = serde_json::to_string(&SessionStatus::ModelLoading { progress: 0.5 }).unwrap();
        assert_eq!(json, r#"{"state":"model_loading","progress":0.5}"#);
    }

    #[test]
    fn default_parameters_are_valid() {
        let params = InferenceParameters::default();
        assert_eq!(params.repeat_last_n, 64);
        assert_eq!(params.max_token_count, None);
        assert_eq!(params.batch_size, 8);
        assert_eq!(params.top_k, 40);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_token_limit_normalizes_to_unlimited() {
        let params = InferenceParameters {
            max_token_count: Some(0),
            ..Default::default()
        };
        assert_eq!(params.normalized().max_token_count, None);

        let params = InferenceParameters {
            max_token_count: Some(128),
            ..Default::default()
        };
        assert_eq!(params.normalized().max_token_count, Some(128));
    }

    #[test]
    fn rejects_nan_temperature() {
        let params = InferenceParameters {
            temperature: f32::NAN,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParameterError::NotFinite {
                name: "temperature"
            })
        );
    }

    #[test]
    fn temperature_is_capped() {
        let params = InferenceParameters {
            temperature: MAX_TEMPERATURE,
            ..Default::default()
        };
        assert!(params.validate().is_ok());

        let params = InferenceParameters {
            temperature: 2.5,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParameterError::OutOfRange {
                name: "temperature",
                value: 2.5,
                min: 0.0,
                max: 2.0,
            })
        );
    }

    #[test]
    fn rejects_top_p_above_one() {
        let params = InferenceParameters {
            top_p: 1.5,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("top_p"));
    }

    #[test]
    fn rejects_zero_batch_size_and_top_k() {
        let params = InferenceParameters {
            batch_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = InferenceParameters {
            top_k: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn parameters_accept_legacy_temp_field() {
        let json = r#"{"temp": 0.5, "top_k": 10}"#;
        let params: InferenceParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.temperature, 0.5);
        assert_eq!(params.top_k, 10);
        assert_eq!(params.batch_size, 8);
    }
}
