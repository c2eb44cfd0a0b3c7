//! Error type of [`super::ConfigLoader::load`].

use super::super::validation::ConfigGuardRailError;

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a configuration load fails.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The config file could not be read.
    #[error("failed to read config file {path}")]
    FileIo {
        /// File that was opened.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The config file is neither valid TOML nor valid JSON.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: anyhow::Error,
    },
    /// An environment override holds an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidEnv {
        /// Variable name.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The merged configuration failed validation.
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    /// A `.env` file exists but could not be parsed.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
