//! Application settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths::{self, SearchPath};

/// Settings read from `config.toml` in the user config directory.
///
/// Every field is optional in the file.
///
/// ```toml
/// sample_rate = 44100
/// midi_port = "Keystation"
/// master_volume = 0.5
/// data_dir = "/opt/pling/data"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Audio output device name; the default device when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_device: Option<String>,

    /// Only connect to MIDI ports whose name contains this string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_port: Option<String>,

    /// Read-only directory with shipped patches and mappings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Writable directory for saved patches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<PathBuf>,

    /// Initial master volume as linear gain.
    pub master_volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            audio_device: None,
            midi_port: None,
            data_dir: None,
            local_dir: None,
            master_volume: 1.0,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load settings from `path`, or the defaults when it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(e) if e.is_not_found() => Ok(Self::default()),
            other => other,
        }
    }

    /// Load settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Search path built from the directory overrides and the platform
    /// defaults.
    pub fn search_path(&self) -> SearchPath {
        SearchPath::new(
            self.local_dir.clone().unwrap_or_else(paths::user_data_dir),
            self.data_dir.clone().unwrap_or_else(paths::system_data_dir),
        )
    }
}
