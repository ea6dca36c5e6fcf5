//! Platform-specific directories and the two-level search path.
//!
//! Files are looked up in a writable local directory first and a read-only
//! data directory second, so a user can override any shipped patch or
//! controller mapping by saving a file with the same relative path.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/pling/` (Linux), `~/Library/Application Support/pling/` (macOS), `%APPDATA%\pling\` (Windows)
//! - **User data**: `~/.local/share/pling/` (Linux), `~/Library/Application Support/pling/` (macOS), `%APPDATA%\pling\` (Windows)
//! - **System data**: `/usr/share/pling/` (Linux), `/Library/Application Support/pling/` (macOS)

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "pling";

/// Name of the settings file inside [`user_config_dir`].
pub const SETTINGS_FILE: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific data directory, where patches are saved.
pub fn user_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join(APP_NAME)
}

/// Returns the system-wide data directory with the shipped patches and
/// controller mappings.
pub fn system_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support").join(APP_NAME)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
    }
}

/// Path of the settings file.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Create `dir` and its parents if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }
    Ok(())
}

/// Local directory first, data directory second.
///
/// # Example
///
/// ```rust,no_run
/// use pling_config::SearchPath;
///
/// let search = SearchPath::new("/home/me/.local/share/pling", "/usr/share/pling");
/// let path = search.load_path("controllers/default.toml");
/// println!("mapping at {}", path.display());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    local_dir: PathBuf,
    data_dir: PathBuf,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(user_data_dir(), system_data_dir())
    }
}

impl SearchPath {
    /// Create a search path.
    pub fn new(local_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// The writable directory.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// The read-only directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Where to read `relative` from: the local copy if it exists, otherwise
    /// the data directory (whether or not the file exists there).
    pub fn load_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        let local = self.local_dir.join(relative);
        if local.exists() {
            local
        } else {
            self.data_dir.join(relative)
        }
    }

    /// Like [`SearchPath::load_path`], but `None` when neither location has
    /// the file.
    pub fn find(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        let path = self.load_path(relative);
        path.is_file().then_some(path)
    }

    /// Where to write `relative`, creating its parent directory.
    pub fn save_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        let path = self.local_dir.join(relative);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dirs_end_with_app_name() {
        assert!(user_config_dir().ends_with(APP_NAME));
        assert!(user_data_dir().ends_with(APP_NAME));
        assert!(system_data_dir().ends_with(APP_NAME));
        assert!(settings_path().ends_with(SETTINGS_FILE));
    }

    #[test]
    fn test_local_overrides_data() {
        let local = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let search = SearchPath::new(local.path(), data.path());

        std::fs::write(data.path().join("a.toml"), "").unwrap();
        assert_eq!(search.load_path("a.toml"), data.path().join("a.toml"));

        std::fs::write(local.path().join("a.toml"), "").unwrap();
        assert_eq!(search.load_path("a.toml"), local.path().join("a.toml"));
    }

    #[test]
    fn test_find_missing() {
        let local = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let search = SearchPath::new(local.path(), data.path());
        assert!(search.find("missing.toml").is_none());
    }

    #[test]
    fn test_save_path_creates_parent() {
        let local = TempDir::new().unwrap();
        let search = SearchPath::new(local.path().join("nested"), "/nonexistent");
        let path = search.save_path("programs/bank-0/1.toml").unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(path.starts_with(local.path()));
    }
}
