//! Configuration management for Telehook
//!
//! Values are layered once at startup: built-in defaults, then the settings
//! file, then the process environment. The binary applies command-line
//! overrides last.

mod relay;
pub mod serde_utils;
mod source;

pub use relay::{LivenessConfig, Protocol, ReconnectConfig, RelayConfig, WebhookConfig};
pub use source::{AmiConfig, AriConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "telehook.toml";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telehook")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Pick the settings file to read
///
/// An explicit path must exist. Otherwise `./telehook.toml` wins over the
/// per-user default; `None` means defaults only.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    let default_path = default_config_path();
    Ok(default_path.exists().then_some(default_path))
}

impl RelayConfig {
    /// Build the startup configuration: defaults, settings file, environment
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(explicit)? {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                load_config(&path)?
            }
            None => {
                tracing::info!("No settings file found, using defaults and environment");
                RelayConfig::default()
            }
        };

        config.apply_process_env()?;
        Ok(config)
    }
}
