//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STASH_*)
//! 2. TOML config file (if STASH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STASH_*)
/// 2. TOML config file (if STASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory holding `manifest.json` and one directory per entry.
    ///
    /// Set via STASH_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via STASH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per document or sub-resource.
    ///
    /// Set via STASH_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via STASH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Age in seconds after which a cached entry is no longer served.
    ///
    /// Set via STASH_MAX_AGE_SECS environment variable.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Sub-resource fetches allowed in flight per cache operation.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Whether request interception starts enabled.
    ///
    /// Set via STASH_INTERCEPT_ENABLED environment variable.
    #[serde(default)]
    pub intercept_enabled: bool,

    /// Hostnames eligible for interception. Empty means every host.
    #[serde(default)]
    pub intercepted_domains: Vec<String>,

    /// Regexes matched against request URLs; matches always go to the network.
    #[serde(default = "default_bypass_patterns")]
    pub bypass_patterns: Vec<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./stash-cache")
}

fn default_user_agent() -> String {
    "stash/0.1".into()
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_concurrency() -> usize {
    8
}

fn default_bypass_patterns() -> Vec<String> {
    vec!["/api/".into(), r"/socket\.io/".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_age_secs: default_max_age_secs(),
            max_concurrency: default_max_concurrency(),
            intercept_enabled: false,
            intercepted_domains: Vec::new(),
            bypass_patterns: default_bypass_patterns(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Freshness window for cached entries.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STASH_`
    /// 2. TOML file from `STASH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from("./stash-cache"));
        assert_eq!(config.user_agent, "stash/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_age_secs, 86_400);
        assert_eq!(config.max_concurrency, 8);
        assert!(!config.intercept_enabled);
        assert!(config.intercepted_domains.is_empty());
        assert_eq!(config.bypass_patterns.len(), 2);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.max_age(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "stash.toml",
                r#"
                    cache_dir = "/var/cache/stash"
                    max_age_secs = 600
                    intercepted_domains = ["example.com"]
                "#,
            )?;
            jail.set_env("STASH_CONFIG_FILE", "stash.toml");
            jail.set_env("STASH_MAX_AGE_SECS", "1200");
            jail.set_env("STASH_INTERCEPT_ENABLED", "true");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_dir, PathBuf::from("/var/cache/stash"));
            assert_eq!(config.max_age_secs, 1200);
            assert!(config.intercept_enabled);
            assert_eq!(config.intercepted_domains, vec!["example.com".to_string()]);
            assert_eq!(config.user_agent, "stash/0.1");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STASH_MAX_CONCURRENCY", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_concurrency"));
            Ok(())
        });
    }
}
