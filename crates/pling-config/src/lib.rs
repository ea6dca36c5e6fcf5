//! Settings, patch storage and controller mappings for pling.
//!
//! Everything pling persists is TOML:
//!
//! - **Settings**: `config.toml` in the user config directory
//! - **Patches**: `programs/bank-N/P.toml`, one file per bank/program pair
//! - **Controller mappings**: `controllers/HWID.toml`
//!
//! Patches and mappings are resolved through a [`SearchPath`]: the user's
//! writable data directory first, the shipped data directory second.
//!
//! # Example
//!
//! ```rust,no_run
//! use pling_config::{Patch, PatchStore, Settings, settings_path};
//!
//! let settings = Settings::load_or_default(settings_path()).unwrap();
//! let store = PatchStore::new(settings.search_path());
//!
//! let patch = store.load(0, 0).unwrap();
//! println!("{} plays on {}", patch.name, patch.engine);
//!
//! store.save(0, 1, &Patch::new("Copy", patch.engine.clone())).unwrap();
//! ```

mod controller;
mod error;
mod patch;
mod settings;

/// Platform-specific directories and the search path.
pub mod paths;

pub use controller::ControllerFile;
pub use error::ConfigError;
pub use patch::{Patch, PatchStore, bank_number};
pub use paths::{
    SearchPath, ensure_dir, settings_path, system_data_dir, user_config_dir, user_data_dir,
};
pub use settings::Settings;
