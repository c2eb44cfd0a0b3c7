//! Guard rails applied after every load: URL schemes, non-zero timings,
//! and warnings for risky but legal combinations.

use std::fmt;

use thiserror::Error;
use url::Url;

use super::models::SyncConfig;

/// A configuration value that would make the sync layer unusable.
#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    /// A URL field does not parse.
    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl {
        /// Dotted config key.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// A URL field uses the wrong scheme for its endpoint.
    #[error("{field} must use one of {expected:?}, got '{scheme}'")]
    UnsupportedScheme {
        /// Dotted config key.
        field: &'static str,
        /// Scheme found in the value.
        scheme: String,
        /// Schemes accepted for this key.
        expected: &'static [&'static str],
    },
    /// A timing or capacity is zero.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Dotted config key.
        field: &'static str,
    },
}

/// Non-fatal configuration problems surfaced alongside a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A bearer token is configured for a remote plain-HTTP API.
    PlaintextToken {
        /// Host the token would be sent to.
        host: String,
    },
    /// The API uses TLS while the push channel is plain `ws://`.
    MixedTransport,
}

impl ConfigWarning {
    /// Suggested remedy, if there is an obvious one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigWarning::PlaintextToken { .. } => {
                Some("use an https:// base URL for remote backends")
            }
            ConfigWarning::MixedTransport => Some("use a wss:// push URL"),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::PlaintextToken { host } => {
                write!(f, "API token will be sent to {host} over unencrypted HTTP")
            }
            ConfigWarning::MixedTransport => {
                f.write_str("API uses TLS but the push channel does not")
            }
        }
    }
}

const HTTP_SCHEMES: &[&str] = &["http", "https"];
const WS_SCHEMES: &[&str] = &["ws", "wss"];

/// Reject unusable values and collect warnings for the rest.
pub fn apply_guard_rails(
    config: &SyncConfig,
) -> Result<Vec<ConfigWarning>, ConfigGuardRailError> {
    let mut warnings = Vec::new();

    let api_url = parse_url("api.base_url", &config.api.base_url, HTTP_SCHEMES)?;
    let push_url = parse_url("push.url", &config.push.url, WS_SCHEMES)?;

    non_zero("api.request_timeout_ms", config.api.request_timeout_ms)?;
    non_zero("poller.interval_ms", config.poller.interval_ms)?;
    non_zero("push.reconnect_delay_ms", config.push.reconnect_delay_ms)?;
    non_zero("push.feed_capacity", config.push.feed_capacity as u64)?;

    if config.api.token.is_some() && api_url.scheme() == "http" && !is_loopback(&api_url) {
        warnings.push(ConfigWarning::PlaintextToken {
            host: api_url.host_str().unwrap_or_default().to_string(),
        });
    }

    if push_url.scheme() == "ws" && api_url.scheme() == "https" {
        warnings.push(ConfigWarning::MixedTransport);
    }

    Ok(warnings)
}

fn parse_url(
    field: &'static str,
    value: &str,
    expected: &'static [&'static str],
) -> Result<Url, ConfigGuardRailError> {
    let url = Url::parse(value).map_err(|source| {
        ConfigGuardRailError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        }
    })?;
    if !expected.contains(&url.scheme()) {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        });
    }
    Ok(url)
}

fn non_zero(field: &'static str, value: u64) -> Result<(), ConfigGuardRailError> {
    if value == 0 {
        Err(ConfigGuardRailError::ZeroValue { field })
    } else {
        Ok(())
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}
