//! Client configuration loading: backend URL, local store path and directions provider.

use std::{env, fs, io::ErrorKind, path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/arfollow.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARFOLLOW_CONFIG_PATH";
/// Environment variable that overrides the configured backend URL.
const SERVER_URL_ENV: &str = "ARFOLLOW_SERVER_URL";

const DEFAULT_SERVER_URL: &str = "http://localhost/arfollow/api";
const DEFAULT_STORE_PATH: &str = "arfollow.sqlite";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Immutable runtime configuration shared across the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL every endpoint path is joined to.
    pub server_url: String,
    /// SQLite file backing the local cache.
    pub store_path: PathBuf,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
    /// Walking directions web service endpoint.
    pub directions_url: String,
    /// Directions are disabled when no key is configured.
    pub directions_api_key: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = Self::load_from(&path);
        config.with_env_overrides()
    }

    /// Load the configuration file at `path` without applying environment overrides.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        server_url = %app_config.server_url,
                        "loaded client config"
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

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env::var(SERVER_URL_ENV).ok().filter(|url| !url.is_empty()) {
            info!(server_url = %url, "server url overridden from environment");
            self.server_url = url;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            directions_url: DEFAULT_DIRECTIONS_URL.into(),
            directions_api_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    server_url: Option<String>,
    store_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    directions_url: Option<String>,
    directions_api_key: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            server_url: value.server_url.unwrap_or(defaults.server_url),
            store_path: value.store_path.unwrap_or(defaults.store_path),
            request_timeout: value
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            directions_url: value.directions_url.unwrap_or(defaults.directions_url),
            directions_api_key: value.directions_api_key.filter(|key| !key.is_empty()),
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
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/arfollow.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server_url": "https://arfollow.example/api", "request_timeout_secs": 15, "directions_api_key": ""}}"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path());
        assert_eq!(config.server_url, "https://arfollow.example/api");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.directions_api_key, None);
    }

    #[test]
    fn malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(AppConfig::load_from(file.path()), AppConfig::default());
    }
}
