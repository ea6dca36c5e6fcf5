//! Patch documents and the bank/program store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths::SearchPath;

/// One saved program: a name, the engine that plays it and the engine's
/// parameters.
///
/// The parameter table is opaque here; each engine defines its own schema.
///
/// # TOML Format
///
/// ```toml
/// name = "Soft pad"
/// engine = "Simple"
///
/// [parameters.amplitude_envelope]
/// attack = 0.3
/// decay = 1.0
/// sustain = 0.7
/// release = 1.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    /// Display name.
    pub name: String,

    /// Engine name as registered with the synth.
    pub engine: String,

    /// Engine-specific parameters.
    #[serde(default)]
    pub parameters: toml::Table,
}

impl Patch {
    /// Create a patch with empty parameters.
    pub fn new(name: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            parameters: toml::Table::new(),
        }
    }

    /// Replace the parameters.
    pub fn with_parameters(mut self, parameters: toml::Table) -> Self {
        self.parameters = parameters;
        self
    }

    /// Load a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a patch from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the patch to a TOML file, creating the parent directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Bank number addressed by a bank select LSB/MSB pair.
pub fn bank_number(bank_lsb: u8, bank_msb: u8) -> u16 {
    (u16::from(bank_lsb) << 7) | u16::from(bank_msb)
}

/// Patches organized as `programs/bank-N/P.toml` on a [`SearchPath`].
#[derive(Debug, Clone, Default)]
pub struct PatchStore {
    search: SearchPath,
}

impl PatchStore {
    /// Store on a search path.
    pub fn new(search: SearchPath) -> Self {
        Self { search }
    }

    /// The search path.
    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    /// Path of a patch relative to the search path roots.
    pub fn relative_path(bank: u16, program: u8) -> PathBuf {
        PathBuf::from("programs")
            .join(format!("bank-{bank}"))
            .join(format!("{program}.toml"))
    }

    /// Load a patch, preferring the local copy.
    pub fn load(&self, bank: u16, program: u8) -> Result<Patch, ConfigError> {
        let relative = Self::relative_path(bank, program);
        let path = self
            .search
            .find(&relative)
            .ok_or(ConfigError::NotFound(relative))?;
        Patch::load(path)
    }

    /// Save a patch to the local directory and return where it went.
    pub fn save(&self, bank: u16, program: u8, patch: &Patch) -> Result<PathBuf, ConfigError> {
        let path = self.search.save_path(Self::relative_path(bank, program))?;
        patch.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAD: &str = r#"
name = "Soft pad"
engine = "Simple"

[parameters.amplitude_envelope]
attack = 0.3
decay = 1.0
sustain = 0.7
release = 1.5
"#;

    #[test]
    fn test_patch_from_toml() {
        let patch = Patch::from_toml(PAD).unwrap();
        assert_eq!(patch.name, "Soft pad");
        assert_eq!(patch.engine, "Simple");
        let env = patch.parameters["amplitude_envelope"].as_table().unwrap();
        assert_eq!(env["sustain"].as_float(), Some(0.7));
    }

    #[test]
    fn test_patch_without_parameters() {
        let patch = Patch::from_toml("name = \"Init\"\nengine = \"Octalope\"\n").unwrap();
        assert!(patch.parameters.is_empty());
    }

    #[test]
    fn test_patch_requires_engine() {
        assert!(Patch::from_toml("name = \"Broken\"\n").is_err());
    }

    #[test]
    fn test_bank_number() {
        assert_eq!(bank_number(0, 0), 0);
        assert_eq!(bank_number(0, 5), 5);
        assert_eq!(bank_number(1, 0), 128);
        assert_eq!(bank_number(127, 127), 16383);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            PatchStore::relative_path(128, 7),
            PathBuf::from("programs/bank-128/7.toml")
        );
    }

    #[test]
    fn test_store_save_then_load() {
        let local = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let store = PatchStore::new(SearchPath::new(local.path(), data.path()));

        let patch = Patch::from_toml(PAD).unwrap();
        let path = store.save(0, 3, &patch).unwrap();
        assert!(path.starts_with(local.path()));
        assert_eq!(store.load(0, 3).unwrap(), patch);
    }

    #[test]
    fn test_store_missing_patch() {
        let local = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let store = PatchStore::new(SearchPath::new(local.path(), data.path()));
        let err = store.load(2, 9).unwrap_err();
        assert!(err.is_not_found(), "got {err}");
    }

    #[test]
    fn test_store_reads_data_dir() {
        let local = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let store = PatchStore::new(SearchPath::new(local.path(), data.path()));

        let dir = data.path().join("programs/bank-0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("0.toml"), PAD).unwrap();

        assert_eq!(store.load(0, 0).unwrap().name, "Soft pad");
    }
}
