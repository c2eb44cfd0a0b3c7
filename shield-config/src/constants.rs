//! Default values and environment keys.

/// Backend served on the local machine.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";
/// Push channel of [`DEFAULT_API_URL`].
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Scan status poll cadence.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Wait before reopening a lost push connection.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Most recent push events kept for display.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Environment variable names read by the loader.
pub mod env {
    /// Path of a TOML or JSON config file.
    pub const CONFIG_PATH: &str = "SHIELD_CONFIG_PATH";
    /// Overrides `api.base_url`.
    pub const API_URL: &str = "SHIELD_API_URL";
    /// Overrides `api.token`.
    pub const API_TOKEN: &str = "SHIELD_API_TOKEN";
    /// Overrides `api.request_timeout_ms`; accepts `humantime` durations.
    pub const REQUEST_TIMEOUT: &str = "SHIELD_REQUEST_TIMEOUT";
    /// Overrides `push.url`.
    pub const WS_URL: &str = "SHIELD_WS_URL";
    /// Overrides `poller.interval_ms`; accepts `humantime` durations.
    pub const POLL_INTERVAL: &str = "SHIELD_POLL_INTERVAL";
    /// Overrides `push.reconnect_delay_ms`; accepts `humantime` durations.
    pub const RECONNECT_DELAY: &str = "SHIELD_RECONNECT_DELAY";
    /// Overrides `push.feed_capacity`.
    pub const EVENT_BUFFER: &str = "SHIELD_EVENT_BUFFER";
}
