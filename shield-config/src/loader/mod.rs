pub mod error;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use tracing::debug;

use self::error::ConfigLoadError;
use crate::constants::env;
use crate::models::{ConfigSource, SyncConfig};
use crate::validation::{ConfigWarning, apply_guard_rails};

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Result of a successful load: the validated config plus any non-fatal
/// warnings the caller should surface.
#[derive(Debug)]
pub struct ConfigLoad {
    /// Validated configuration.
    pub config: SyncConfig,
    /// Non-fatal problems found by the guard rails.
    pub warnings: Vec<ConfigWarning>,
}

/// Builds a [`SyncConfig`] from defaults, an optional file and the
/// environment.
///
/// Evaluation order:
/// 1) `.env` in the working directory (process environment only),
/// 2) the explicit path, else `$SHIELD_CONFIG_PATH` (TOML or JSON),
/// 3) `SHIELD_*` environment overrides,
/// 4) guard rails.
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: EnvLookup,
    load_env_file: bool,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("path", &self.path)
            .field("load_env_file", &self.load_env_file)
            .finish()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader backed by the process environment.
    pub fn new() -> Self {
        Self {
            path: None,
            env: Box::new(|key| std::env::var(key).ok()),
            load_env_file: true,
        }
    }

    /// Loader backed by an arbitrary key lookup. No `.env` file is read.
    pub fn with_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            path: None,
            env: Box::new(lookup),
            load_env_file: false,
        }
    }

    /// Read this file instead of `$SHIELD_CONFIG_PATH`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Run every layer in order and validate the result.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;

        let (mut config, source) = self.load_file()?;
        config.metadata.source = source;
        config.metadata.env_file_loaded = env_file_loaded;

        self.apply_env_overrides(&mut config)?;

        let warnings = apply_guard_rails(&config)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.trim().is_empty())
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if !self.load_env_file {
            return Ok(false);
        }
        match dotenvy::dotenv() {
            Ok(path) => {
                debug!(path = %path.display(), "loaded .env file");
                Ok(true)
            }
            Err(err) if err.not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file(&self) -> Result<(SyncConfig, ConfigSource), ConfigLoadError> {
        if let Some(path) = &self.path {
            let config = load_from_file(path)?;
            return Ok((config, ConfigSource::File(path.clone())));
        }

        if let Some(raw) = self.var(env::CONFIG_PATH) {
            let path = PathBuf::from(raw);
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        Ok((SyncConfig::default(), ConfigSource::Default))
    }

    fn apply_env_overrides(
        &self,
        config: &mut SyncConfig,
    ) -> Result<(), ConfigLoadError> {
        let overrides = &mut config.metadata.overrides;

        if let Some(url) = self.var(env::API_URL) {
            config.api.base_url = url.trim_end_matches('/').to_string();
            overrides.push(env::API_URL);
        }
        if let Some(token) = self.var(env::API_TOKEN) {
            config.api.token = Some(token);
            overrides.push(env::API_TOKEN);
        }
        if let Some(raw) = self.var(env::REQUEST_TIMEOUT) {
            config.api.request_timeout_ms =
                parse_duration_ms(env::REQUEST_TIMEOUT, &raw)?;
            overrides.push(env::REQUEST_TIMEOUT);
        }
        if let Some(url) = self.var(env::WS_URL) {
            config.push.url = url;
            overrides.push(env::WS_URL);
        }
        if let Some(raw) = self.var(env::POLL_INTERVAL) {
            config.poller.interval_ms =
                parse_duration_ms(env::POLL_INTERVAL, &raw)?;
            overrides.push(env::POLL_INTERVAL);
        }
        if let Some(raw) = self.var(env::RECONNECT_DELAY) {
            config.push.reconnect_delay_ms =
                parse_duration_ms(env::RECONNECT_DELAY, &raw)?;
            overrides.push(env::RECONNECT_DELAY);
        }
        if let Some(raw) = self.var(env::EVENT_BUFFER) {
            config.push.feed_capacity = raw.trim().parse().map_err(|err| {
                ConfigLoadError::InvalidEnv {
                    key: env::EVENT_BUFFER,
                    reason: format!("{err}"),
                }
            })?;
            overrides.push(env::EVENT_BUFFER);
        }

        Ok(())
    }
}

/// Read a TOML or JSON config file. Files without a recognised extension
/// are tried as TOML first, then JSON.
pub fn load_from_file(path: &Path) -> Result<SyncConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::FileIo {
            path: path.to_path_buf(),
            source,
        })?;

    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents),
        Some("toml") | Some("tml") => parse_toml(&contents),
        _ => parse_toml(&contents).or_else(|toml_err| {
            parse_json(&contents).map_err(|json_err| {
                anyhow!("not TOML ({toml_err}) nor JSON ({json_err})")
            })
        }),
    };

    parsed.map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_toml(raw: &str) -> anyhow::Result<SyncConfig> {
    toml::from_str(raw).map_err(|err| anyhow!("{err}"))
}

fn parse_json(raw: &str) -> anyhow::Result<SyncConfig> {
    serde_json::from_str(raw).map_err(|err| anyhow!("{err}"))
}

/// Accepts humantime (`2s`, `1500ms`, `1m 30s`) or a bare millisecond count.
fn parse_duration_ms(key: &'static str, raw: &str) -> Result<u64, ConfigLoadError> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(raw)
        .map(|duration: Duration| duration.as_millis() as u64)
        .map_err(|err| ConfigLoadError::InvalidEnv {
            key,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_humantime_and_plain_millis() {
        assert_eq!(parse_duration_ms("K", "2s").unwrap(), 2_000);
        assert_eq!(parse_duration_ms("K", "1500ms").unwrap(), 1_500);
        assert_eq!(parse_duration_ms("K", "750").unwrap(), 750);
        assert!(parse_duration_ms("K", "soon").is_err());
    }
}
