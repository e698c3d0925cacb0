//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_dir` or `user_agent` is empty
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_age_secs` is 0
    /// - `max_concurrency` is 0 or exceeds 64
    /// - a `bypass_patterns` entry is not a valid regex
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_dir".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_age_secs == 0 {
            return Err(ConfigError::Invalid { field: "max_age_secs".into(), reason: "must be greater than 0".into() });
        }

        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err(ConfigError::Invalid {
                field: "max_concurrency".into(),
                reason: "must be between 1 and 64".into(),
            });
        }

        if let Err(e) = regex::RegexSet::new(&self.bypass_patterns) {
            return Err(ConfigError::Invalid { field: "bypass_patterns".into(), reason: e.to_string() });
        }

        if self.intercepted_domains.iter().any(|d| d.trim().is_empty()) {
            tracing::warn!("intercepted_domains contains blank entries; they never match a host");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_cache_dir() {
        let config = AppConfig { cache_dir: Default::default(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_dir"));
    }

    #[test]
    fn test_validate_zero_max_age() {
        let config = AppConfig { max_age_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_age_secs"));
    }

    #[test]
    fn test_validate_bad_bypass_pattern() {
        let config = AppConfig { bypass_patterns: vec!["/api/(".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "bypass_patterns"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config =
            AppConfig { max_bytes: 1, timeout_ms: 100, max_concurrency: 64, max_age_secs: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
