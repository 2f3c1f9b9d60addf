//! Application-level configuration loading, covering the stream cadence knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUBQUIZ_BACK_CONFIG_PATH";

/// Default poll interval between store reads in a stream loop.
const DEFAULT_TICK_MS: u64 = 1_250;
/// Default cadence of the proxy-facing keepalive event.
const DEFAULT_KEEPALIVE_SECS: u64 = 30;
/// Default hard ceiling on a single stream connection's lifetime.
const DEFAULT_MAX_LIFETIME_SECS: u64 = 420;
/// Lower bound on the configured tick; `tokio::time::interval` panics on a
/// zero period.
const MIN_TICK_MS: u64 = 100;
/// Lower bound on the configured keepalive cadence.
const MIN_KEEPALIVE_SECS: u64 = 1;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Cadence settings for the change-detection stream loops.
    pub stream: StreamSettings,
}

#[derive(Debug, Clone, Copy)]
/// Cadence knobs for one stream connection loop.
pub struct StreamSettings {
    /// Poll interval between store reads.
    pub tick: Duration,
    /// Keepalive event cadence.
    pub keepalive: Duration,
    /// Hard connection lifetime ceiling; the client reconnects afterwards.
    pub max_lifetime: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            keepalive: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            max_lifetime: Duration::from_secs(DEFAULT_MAX_LIFETIME_SECS),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    stream: RawStream,
}

#[derive(Debug, Deserialize, Default)]
/// JSON representation of the stream cadence block.
struct RawStream {
    tick_ms: Option<u64>,
    keepalive_secs: Option<u64>,
    max_lifetime_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            stream: StreamSettings {
                tick: Duration::from_millis(
                    raw.stream.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(MIN_TICK_MS),
                ),
                keepalive: Duration::from_secs(
                    raw.stream
                        .keepalive_secs
                        .unwrap_or(DEFAULT_KEEPALIVE_SECS)
                        .max(MIN_KEEPALIVE_SECS),
                ),
                max_lifetime: Duration::from_secs(
                    raw.stream
                        .max_lifetime_secs
                        .unwrap_or(DEFAULT_MAX_LIFETIME_SECS),
                ),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_only_what_it_names() {
        let raw: RawConfig = serde_json::from_str(r#"{"stream": {"tick_ms": 500}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.stream.tick, Duration::from_millis(500));
        assert_eq!(
            config.stream.keepalive,
            Duration::from_secs(DEFAULT_KEEPALIVE_SECS)
        );
    }

    #[test]
    fn zero_cadences_are_clamped_to_their_minimums() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"stream": {"tick_ms": 0, "keepalive_secs": 0}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.stream.tick, Duration::from_millis(MIN_TICK_MS));
        assert_eq!(
            config.stream.keepalive,
            Duration::from_secs(MIN_KEEPALIVE_SECS)
        );
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.stream.tick, Duration::from_millis(DEFAULT_TICK_MS));
        assert_eq!(
            config.stream.max_lifetime,
            Duration::from_secs(DEFAULT_MAX_LIFETIME_SECS)
        );
    }
}
