use serde::{Deserialize, Serialize};

/// Channel sizing for the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Queued view intents before senders wait (valid range: 1-1024).
    pub intent_capacity: u32,
    /// Session events buffered per subscriber (valid range: 1-4096).
    pub event_capacity: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            intent_capacity: 32,
            event_capacity: 64,
        }
    }
}
