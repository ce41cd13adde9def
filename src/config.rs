//! Application-level configuration loading and storage backend selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PHOTO_REVEAL_CONFIG_PATH";

const DEFAULT_GAME_ID: &str = "photo_reveal";
const DEFAULT_GRID_SIZE: u32 = 4;
const DEFAULT_CODE_PREFIX: &str = "WED";
/// Also the floor for `verifyDelayMs`: entry checks are never faster.
const DEFAULT_VERIFY_DELAY_MS: u64 = 800;
const DEFAULT_ENTRY_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Smallest accepted grid side.
pub const MIN_GRID_SIZE: u32 = 1;
/// Largest accepted grid side.
pub const MAX_GRID_SIZE: u32 = 12;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Identifier of the singleton game document.
    pub game_id: String,
    /// Grid side used when an upload does not specify one.
    pub grid_size: u32,
    /// Prefix of every generated unlock code.
    pub code_prefix: String,
    /// Public URL printed in QR codes when the admin does not supply one.
    pub public_base_url: Option<String>,
    /// Minimum time an entry visit stays in the verifying phase.
    pub verify_delay: Duration,
    /// Upper bound the entry route waits for a resolution.
    pub entry_timeout: Duration,
    /// Directory of the local file backend.
    pub data_dir: PathBuf,
    /// Request body limit for photo uploads.
    pub max_image_bytes: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        game_id = %app_config.game_id,
                        grid_size = app_config.grid_size,
                        "loaded configuration"
                    );
                    app_config
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

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    game_id: Option<String>,
    grid_size: Option<u32>,
    code_prefix: Option<String>,
    public_base_url: Option<String>,
    verify_delay_ms: Option<u64>,
    entry_timeout_ms: Option<u64>,
    data_dir: Option<PathBuf>,
    max_image_bytes: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let grid_size = match value.grid_size {
            Some(size) if (MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size) => size,
            Some(size) => {
                warn!(
                    grid_size = size,
                    "configured grid size out of range; using default"
                );
                DEFAULT_GRID_SIZE
            }
            None => DEFAULT_GRID_SIZE,
        };

        let verify_delay_ms = match value.verify_delay_ms {
            Some(delay) if delay >= DEFAULT_VERIFY_DELAY_MS => delay,
            Some(delay) => {
                warn!(
                    verify_delay_ms = delay,
                    minimum = DEFAULT_VERIFY_DELAY_MS,
                    "configured verify delay below minimum; clamping"
                );
                DEFAULT_VERIFY_DELAY_MS
            }
            None => DEFAULT_VERIFY_DELAY_MS,
        };

        Self {
            game_id: non_blank(value.game_id).unwrap_or_else(|| DEFAULT_GAME_ID.into()),
            grid_size,
            code_prefix: non_blank(value.code_prefix)
                .unwrap_or_else(|| DEFAULT_CODE_PREFIX.into()),
            public_base_url: non_blank(value.public_base_url),
            verify_delay: Duration::from_millis(verify_delay_ms),
            entry_timeout: Duration::from_millis(
                value.entry_timeout_ms.unwrap_or(DEFAULT_ENTRY_TIMEOUT_MS),
            ),
            data_dir: value
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            max_image_bytes: value.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Storage backend picked once at startup from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// `COUCH_BASE_URL` and `COUCH_DB` are set.
    Couch,
    /// `MONGO_URI` and `MONGO_DB` are set.
    Mongo,
    /// Nothing remote configured: single-device JSON file.
    Local,
}

impl StoreBackend {
    /// Pick the backend from the process environment.
    pub fn from_env() -> Self {
        Self::select(|key| env::var(key).ok())
    }

    /// Short name reported by the health route.
    pub fn label(self) -> &'static str {
        match self {
            Self::Couch => "couchdb",
            Self::Mongo => "mongodb",
            Self::Local => "local",
        }
    }

    fn select(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).is_some_and(|value| !value.trim().is_empty());
        if present("COUCH_BASE_URL") && present("COUCH_DB") {
            Self::Couch
        } else if present("MONGO_URI") && present("MONGO_DB") {
            Self::Mongo
        } else {
            Self::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "gridSize": 6, "publicBaseUrl": "  " }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.grid_size, 6);
        assert_eq!(config.code_prefix, "WED");
        assert_eq!(config.game_id, "photo_reveal");
        assert!(config.public_base_url.is_none());
        assert_eq!(config.verify_delay, Duration::from_millis(800));
    }

    #[test]
    fn out_of_range_grid_size_falls_back() {
        let raw: RawConfig = serde_json::from_str(r#"{ "gridSize": 40 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).grid_size, DEFAULT_GRID_SIZE);
    }

    #[test]
    fn verify_delay_is_clamped_to_the_minimum() {
        let raw: RawConfig = serde_json::from_str(r#"{ "verifyDelayMs": 0 }"#).unwrap();
        assert_eq!(
            AppConfig::from(raw).verify_delay,
            Duration::from_millis(DEFAULT_VERIFY_DELAY_MS)
        );

        let raw: RawConfig = serde_json::from_str(r#"{ "verifyDelayMs": 1500 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).verify_delay, Duration::from_millis(1500));
    }

    #[test]
    fn backend_selection_prefers_couch_then_mongo() {
        let env = |pairs: &[(&str, &str)]| {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            StoreBackend::select(move |key| map.get(key).cloned())
        };

        assert_eq!(env(&[]), StoreBackend::Local);
        assert_eq!(
            env(&[("MONGO_URI", "mongodb://db"), ("MONGO_DB", "photos")]),
            StoreBackend::Mongo
        );
        assert_eq!(
            env(&[
                ("COUCH_BASE_URL", "http://couch:5984"),
                ("COUCH_DB", "photos"),
                ("MONGO_URI", "mongodb://db"),
                ("MONGO_DB", "photos"),
            ]),
            StoreBackend::Couch
        );
        assert_eq!(env(&[("COUCH_BASE_URL", "http://couch")]), StoreBackend::Local);
    }
}
