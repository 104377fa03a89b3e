//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Tracing filter directive for the parley crates.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "parley=debug",
            LogLevel::Info => "parley=info",
            LogLevel::Warning => "parley=warn",
            LogLevel::Error => "parley=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
