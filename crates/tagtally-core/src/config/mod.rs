//! Configuration management for tagtally.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure for tagtally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker and format settings
    pub processing: ProcessingConfig,

    /// Tag post-processing rules
    pub postprocess: PostprocessConfig,

    /// Batch-mode options
    pub batch: BatchOptions,

    /// Score dump interrogators: name -> directory
    pub interrogators: BTreeMap<String, PathBuf>,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.tagtally.tagtally/config.toml
    /// - Linux: ~/.config/tagtally/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\tagtally\config\config.toml
    ///
    /// Falls back to ~/.tagtally/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tagtally", "tagtally")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".tagtally").join("config.toml")
            })
    }

    /// Get the resolved preset directory path (with ~ expansion).
    pub fn preset_dir(&self) -> PathBuf {
        expand(&self.general.preset_dir)
    }

    /// Score dump directories with ~ expanded.
    pub fn interrogator_dirs(&self) -> impl Iterator<Item = (&str, PathBuf)> + '_ {
        self.interrogators
            .iter()
            .map(|(name, dir)| (name.as_str(), expand(dir)))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
