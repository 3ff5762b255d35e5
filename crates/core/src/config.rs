//! Config file parsing for `~/.config/ark-metadata/config.toml`.
//!
//! Use `lookup_options_from_config` to build the options an `ArkSource` runs with
//! so timeout and dispatch settings apply.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lookup::{DispatchMode, LookupOptions};

pub const DEFAULT_BASE_URL: &str = "https://www.ark.no";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub fan_out: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_workers() -> usize {
    4
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            fan_out: false,
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("ark-metadata/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

/// Load config from the default path (`~/.config/ark-metadata/config.toml`).
/// A missing or unparsable file yields the defaults.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    match load_config_from(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::debug!("Using default config ({}): {}", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Load config from an explicit path.
pub fn load_config_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<AppConfig>(&content)?)
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("ark-metadata");
        p.push("config.toml");
        p
    })
}

/// Build lookup options from config.
pub fn lookup_options_from_config(cfg: &AppConfig) -> LookupOptions {
    LookupOptions {
        base_url: cfg.site.base_url.trim_end_matches('/').to_string(),
        timeout: Duration::from_secs(cfg.lookup.timeout_secs),
        mode: if cfg.lookup.fan_out {
            DispatchMode::FanOut {
                max_workers: cfg.lookup.max_workers.max(1),
            }
        } else {
            DispatchMode::Sequential
        },
    }
}

/// Set a dot-separated key (e.g. `lookup.timeout_secs`) from its string form.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["site", "base_url"] => cfg.site.base_url = value.to_string(),
        ["lookup", sub] => match *sub {
            "timeout_secs" => cfg.lookup.timeout_secs = value.parse().map_err(|_| invalid())?,
            "fan_out" => cfg.lookup.fan_out = value.parse().map_err(|_| invalid())?,
            "max_workers" => cfg.lookup.max_workers = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        ["http", "user_agent"] => cfg.http.user_agent = value.to_string(),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: AppConfig = toml::from_str("[lookup]\nfan_out = true\n").unwrap();
        assert!(cfg.lookup.fan_out);
        assert_eq!(cfg.lookup.timeout_secs, 30);
        assert_eq!(cfg.lookup.max_workers, 4);
        assert_eq!(cfg.site.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = AppConfig::default();
        let opts = lookup_options_from_config(&cfg);
        assert_eq!(opts.mode, DispatchMode::Sequential);
        assert_eq!(opts.timeout, Duration::from_secs(30));

        cfg.lookup.fan_out = true;
        cfg.lookup.max_workers = 0;
        cfg.site.base_url = "http://127.0.0.1:9999/".to_string();
        let opts = lookup_options_from_config(&cfg);
        assert_eq!(opts.mode, DispatchMode::FanOut { max_workers: 1 });
        assert_eq!(opts.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn set_key_parses_values() {
        let mut cfg = AppConfig::default();
        set_config_key(&mut cfg, "lookup.timeout_secs", "5").unwrap();
        set_config_key(&mut cfg, "lookup.fan_out", "true").unwrap();
        set_config_key(&mut cfg, "http.user_agent", "test-agent").unwrap();
        assert_eq!(cfg.lookup.timeout_secs, 5);
        assert!(cfg.lookup.fan_out);
        assert_eq!(cfg.http.user_agent, "test-agent");

        assert!(matches!(
            set_config_key(&mut cfg, "lookup.timeout_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_key(&mut cfg, "library.format", "epub"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[site]\nbase_url = \"http://localhost:1234\"\n").unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.site.base_url, "http://localhost:1234");

        std::fs::write(&path, "[site\nbroken").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
    }
}
