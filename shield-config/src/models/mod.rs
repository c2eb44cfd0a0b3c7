use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_FEED_CAPACITY, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RECONNECT_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_WS_URL,
};

/// Source that produced the file-backed part of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// Built-in defaults, no file read.
    #[default]
    Default,
    /// File named by `SHIELD_CONFIG_PATH`.
    EnvPath(PathBuf),
    /// File passed to [`crate::ConfigLoader::with_path`].
    File(PathBuf),
}

/// Provenance details reported alongside a loaded config.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    /// Where the file-backed values came from.
    pub source: ConfigSource,
    /// Whether a `.env` file was found and applied.
    pub env_file_loaded: bool,
    /// Environment keys that overrode file or default values.
    pub overrides: Vec<&'static str>,
}

/// Top-level configuration for the sync layer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// HTTP scan API.
    pub api: ApiConfig,
    /// Scan status poller.
    pub poller: PollerConfig,
    /// Push event channel.
    pub push: PushConfig,
    /// Filled in by the loader, never read from a file.
    #[serde(skip)]
    pub metadata: ConfigMetadata,
}

/// Backend HTTP API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server root; versioned routes are appended to it.
    pub base_url: String,
    /// Bearer token sent with every request when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ApiConfig {
    /// [`ApiConfig::request_timeout_ms`] as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Scan status polling cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Time between status fetches.
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PollerConfig {
    /// [`PollerConfig::interval_ms`] as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Push channel settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// `ws://` or `wss://` endpoint of the push channel.
    pub url: String,
    /// Fixed wait between a closed connection and the next attempt.
    pub reconnect_delay_ms: u64,
    /// Number of most recent events kept for display.
    pub feed_capacity: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl PushConfig {
    /// [`PushConfig::reconnect_delay_ms`] as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
