//! Backend process and model configuration types.

use serde::{Deserialize, Serialize};

/// How to launch the inference backend.
///
/// The backend speaks newline-delimited JSON on its stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable to spawn.
    pub command: String,
    pub args: Vec<String>,
    /// Wrap prompts in an instruction template before sending them.
    pub wrap_prompt: bool,
    /// Custom template containing `{instruction}`; the built-in
    /// instruction/response template is used when unset.
    pub prompt_template: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: "llama-backend".into(),
            args: Vec::new(),
            wrap_prompt: true,
            prompt_template: None,
        }
    }
}

/// Model selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model file loaded as soon as the session starts.
    pub path: Option<String>,
}
