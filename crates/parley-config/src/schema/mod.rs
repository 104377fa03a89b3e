//! Configuration schema types for Parley.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the chat window starts with.

mod backend;
mod session;
mod system;

pub use backend::*;
pub use session::*;
pub use system::*;

pub use parley_common::InferenceParameters;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Parley.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub backend: BackendConfig,
    pub model: ModelConfig,
    /// Parameters the settings form starts with.
    pub inference: InferenceParameters,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}
