use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project-local configuration files.
pub const CONFIG_DIR: &str = ".agent-reliability";

/// Prefix for environment variable overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "AGENT_RELIABILITY_";

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid half_open_requests: {0}. Must be at least 1")]
    InvalidHalfOpenRequests(u32),

    #[error("Invalid {field}: must be greater than 0")]
    ZeroDuration { field: &'static str },

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .agent-reliability/config.yaml
    /// 3. .agent-reliability/local.yaml (optional overrides)
    /// 4. Environment variables (AGENT_RELIABILITY_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// [`load`](Self::load) rooted at `base` instead of the working directory.
    pub fn load_from_dir(base: impl AsRef<Path>) -> Result<Config> {
        let dir = base.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let breaker = &config.circuit_breaker;
        if breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                breaker.failure_threshold,
            ));
        }
        if breaker.half_open_requests == 0 {
            return Err(ConfigError::InvalidHalfOpenRequests(
                breaker.half_open_requests,
            ));
        }
        if breaker.reset_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "circuit_breaker.reset_timeout_ms",
            });
        }
        if breaker.monitoring_window_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "circuit_breaker.monitoring_window_ms",
            });
        }

        if config.resolver.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "resolver.refresh_interval_secs",
            });
        }
        if config.resolver.system_user_id.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "resolver.system_user_id cannot be empty".to_string(),
            ));
        }

        let harness = &config.harness;
        if harness.default_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "harness.default_timeout_ms",
            });
        }
        if harness.initial_backoff_ms > harness.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                harness.initial_backoff_ms,
                harness.max_backoff_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Environment;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 60_000);
        assert_eq!(config.resolver.refresh_interval_secs, 300);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
environment: production
logging:
  level: debug
  format: pretty
circuit_breaker:
  failure_threshold: 3
  reset_timeout_ms: 1000
harness:
  record_metrics: false
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.half_open_requests, 3);
        assert!(!config.harness.record_metrics);
        assert_eq!(config.harness.default_timeout_ms, 30_000);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert_eq!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat("xml".to_string())
        );
    }

    #[test]
    fn test_validate_breaker_thresholds() {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = 0;
        assert_eq!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidFailureThreshold(0)
        );

        let mut config = Config::default();
        config.circuit_breaker.half_open_requests = 0;
        assert_eq!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidHalfOpenRequests(0)
        );

        let mut config = Config::default();
        config.circuit_breaker.reset_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroDuration { field } if field.ends_with("reset_timeout_ms")
        ));
    }

    #[test]
    fn test_validate_zero_refresh_interval() {
        let mut config = Config::default();
        config.resolver.refresh_interval_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroDuration { .. }
        ));
    }

    #[test]
    fn test_validate_empty_system_user() {
        let mut config = Config::default();
        config.resolver.system_user_id = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ValidationFailed(_)
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.harness.initial_backoff_ms = 30_000;
        config.harness.max_backoff_ms = 10_000;

        assert_eq!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBackoff(30_000, 10_000)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "environment: staging\nresolver:\n  refresh_interval_secs: 60").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.resolver.refresh_interval_secs, 60);
        assert_eq!(config.resolver.system_user_id, "system");
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "circuit_breaker:\n  failure_threshold: 0").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_hierarchical_merging_with_env_override() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("config.yaml"),
            "environment: staging\nlogging:\n  level: info\n  format: json\ncircuit_breaker:\n  failure_threshold: 4\n",
        )
        .unwrap();
        fs::write(config_dir.join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        let config = temp_env::with_vars(
            [
                ("AGENT_RELIABILITY_ENVIRONMENT", Some("production")),
                ("AGENT_RELIABILITY_CIRCUIT_BREAKER__FAILURE_THRESHOLD", Some("7")),
            ],
            || ConfigLoader::load_from_dir(dir.path()),
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production, "Env should win");
        assert_eq!(config.circuit_breaker.failure_threshold, 7);
        assert_eq!(config.logging.level, "debug", "local.yaml should win");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = temp_env::with_vars_unset(
            ["AGENT_RELIABILITY_ENVIRONMENT", "AGENT_RELIABILITY_LOGGING__LEVEL"],
            || ConfigLoader::load_from_dir(dir.path()),
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.harness.pricing_model, "gemini-1.5-pro");
    }
}
