//! Parley configuration system.
//!
//! TOML-based configuration for the backend process, the model loaded at
//! startup, default inference parameters, and logging. All sections use
//! serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use parley_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("backend: {}", config.backend.command);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{ParleyConfig, CONFIG_SCHEMA_VERSION};

use parley_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default `config.toml` if none exists.
pub fn load_config() -> Result<ParleyConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path (e.g. a `--config` override) and validate it.
pub fn load_config_from(path: &Path) -> Result<ParleyConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_serializes_all_sections() {
        let config = ParleyConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"backend\""));
        assert!(json.contains("\"model\""));
        assert!(json.contains("\"inference\""));
        assert!(json.contains("\"session\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = ParleyConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ParleyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.inference.top_k, 40);
        assert_eq!(parsed.session.intent_capacity, 32);
        assert!(parsed.backend.wrap_prompt);
    }

    #[test]
    fn load_config_from_missing_path_is_file_not_found() {
        let err = load_config_from(Path::new("/tmp/parley_missing_config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inference]\ntop_p = 3.0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("inference.top_p"));
    }
}
