//! Configuration du binaire castfollow.
//!
//! Loaded from a YAML file whose path defaults to `castfollow.yaml` and can
//! be overridden with the `CASTFOLLOW_CONFIG` environment variable. A
//! missing file yields the defaults. A couple of fields can additionally be
//! overridden per-environment without touching the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Env var overriding the config file path.
pub const CONFIG_PATH_VAR: &str = "CASTFOLLOW_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "castfollow.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub catalog: CatalogConfig,
    /// Interval between device state polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long mDNS discovery waits for a device, in seconds.
    pub discovery_timeout_secs: u64,
    /// Externally reachable base URL of the stream sink. When unset, the
    /// local IP is guessed and combined with the HTTP port.
    pub stream_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            catalog: CatalogConfig::default(),
            poll_interval_ms: 1000,
            discovery_timeout_secs: 10,
            stream_base_url: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3123,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration, applying env overrides last.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_path(Path::new(&path))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CASTFOLLOW_HTTP_PORT") {
            if let Ok(port) = port.parse() {
                self.http.port = port;
            }
        }
        if let Ok(url) = std::env::var("CASTFOLLOW_CATALOG_URL") {
            self.catalog.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.http.port, 3123);
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(config.stream_base_url.is_none());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_the_rest() {
        let config: Config = serde_yaml::from_str(
            r#"
http:
  port: 4000
catalog:
  base_url: "http://catalog.local:9000"
"#,
        )
        .unwrap();

        assert_eq!(config.http.port, 4000);
        assert_eq!(config.http.bind, "0.0.0.0");
        assert_eq!(config.catalog.base_url, "http://catalog.local:9000");
        assert_eq!(config.discovery_timeout_secs, 10);
    }

    #[test]
    fn stream_base_url_is_optional() {
        let config: Config =
            serde_yaml::from_str("stream_base_url: \"http://192.168.1.5:3123\"\n").unwrap();
        assert_eq!(
            config.stream_base_url.as_deref(),
            Some("http://192.168.1.5:3123")
        );
    }
}
