//! Shared configuration library for the CyberShield sync layer.
//!
//! Centralizes defaults, file loading (TOML or JSON), `.env` handling,
//! environment overrides, and guard-rail validation so the library crates and
//! `shieldctl` agree on a single source of truth for endpoints and timings.

pub mod constants;
/// Layered loading: `.env`, config file, environment overrides.
pub mod loader;
/// Serde models for every configuration section.
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::{
    ApiConfig, ConfigMetadata, ConfigSource, PollerConfig, PushConfig,
    SyncConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning};
