//! Program loading errors.

use pling_config::ConfigError;
use thiserror::Error;

/// Why a program could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The patch file is missing or malformed.
    #[error(transparent)]
    Patch(#[from] ConfigError),

    /// The patch names an engine that is not registered.
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    /// The engine rejected the patch parameters.
    #[error("invalid parameters for {engine}: {reason}")]
    InvalidParameters {
        /// Engine that rejected the parameters.
        engine: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl LoadError {
    /// Parameters error for `engine` from a deserialization failure.
    pub fn invalid(engine: &'static str, reason: impl std::fmt::Display) -> Self {
        LoadError::InvalidParameters {
            engine,
            reason: reason.to_string(),
        }
    }
}
