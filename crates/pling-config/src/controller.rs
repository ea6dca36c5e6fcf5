//! Controller mapping files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths::SearchPath;

/// Description of a hardware controller and how its messages map to
/// controls.
///
/// Mapping keys are message strings (`"cc/7"`, `"10/key/36"`) and values
/// are control strings (`"fader/master"`, `"pot/top/3"`); both are parsed
/// by the synth.
///
/// ```toml
/// brand = "Novation"
/// model = "Launchkey 49"
/// keys = 49
/// faders = 9
///
/// [mapping]
/// "cc/7" = "fader/master"
/// "cc/21" = "pot/1"
/// "cc/115" = "play"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerFile {
    /// Manufacturer.
    pub brand: String,
    /// Model.
    pub model: String,
    /// Number of keys.
    pub keys: u8,
    /// Number of generic buttons.
    pub buttons: u8,
    /// Number of faders.
    pub faders: u8,
    /// Number of pots.
    pub pots: u8,
    /// Number of velocity sensitive pads.
    pub pads: u8,
    /// Number of DJ decks.
    pub decks: u8,
    /// Number of selectable banks.
    pub banks: u8,
    /// Ignores the channel of incoming notes.
    pub omni: bool,
    /// Message string to control string.
    pub mapping: BTreeMap<String, String>,
}

impl Default for ControllerFile {
    fn default() -> Self {
        Self {
            brand: "Unknown brand".to_string(),
            model: "Unknown model".to_string(),
            keys: 0,
            buttons: 0,
            faders: 0,
            pots: 0,
            pads: 0,
            decks: 0,
            banks: 0,
            omni: false,
            mapping: BTreeMap::new(),
        }
    }
}

impl ControllerFile {
    /// Name of the fallback mapping.
    pub const DEFAULT: &'static str = "default";

    /// Load a mapping from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a mapping from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the mapping to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of the mapping for a hardware id, relative to the search path.
    pub fn relative_path(hwid: &str) -> PathBuf {
        PathBuf::from("controllers").join(format!("{hwid}.toml"))
    }

    /// Find the mapping for `hwid`, falling back to the default mapping and
    /// then to an empty one.
    pub fn find(search: &SearchPath, hwid: &str) -> Result<Self, ConfigError> {
        let specific = (!hwid.is_empty())
            .then(|| search.find(Self::relative_path(hwid)))
            .flatten();

        match specific.or_else(|| search.find(Self::relative_path(Self::DEFAULT))) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
