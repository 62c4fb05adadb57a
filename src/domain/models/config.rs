use serde::{Deserialize, Serialize};

use super::agent::Environment;

/// Main configuration structure for the reliability layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Deployment tier, read once at process start
    #[serde(default)]
    pub environment: Environment,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default circuit breaker settings
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Configuration resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Test harness defaults
    #[serde(default)]
    pub harness: HarnessConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Circuit breaker defaults applied when a breaker is first created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CircuitBreakerSettings {
    /// Consecutive or windowed failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time the circuit stays open before probing, in milliseconds
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Successful probes required to close a half-open circuit
    #[serde(default = "default_half_open_requests")]
    pub half_open_requests: u32,

    /// Sliding window for failure counting, in milliseconds
    #[serde(default = "default_monitoring_window_ms")]
    pub monitoring_window_ms: u64,

    /// Whether breakers guard calls at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_timeout_ms() -> u64 {
    60_000
}

const fn default_half_open_requests() -> u32 {
    3
}

const fn default_monitoring_window_ms() -> u64 {
    300_000
}

const fn default_true() -> bool {
    true
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            half_open_requests: default_half_open_requests(),
            monitoring_window_ms: default_monitoring_window_ms(),
            enabled: default_true(),
        }
    }
}

/// Configuration resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResolverConfig {
    /// Seconds a resolved snapshot stays fresh
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// User id used for system-level flag evaluation
    #[serde(default = "default_system_user_id")]
    pub system_user_id: String,
}

const fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_system_user_id() -> String {
    "system".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            system_user_id: default_system_user_id(),
        }
    }
}

/// Test harness defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Timeout for cases that do not declare one, in milliseconds
    #[serde(default = "default_harness_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on retry delay, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Record latency, token and cost metrics per case
    #[serde(default = "default_true")]
    pub record_metrics: bool,

    /// Model used to price token usage
    #[serde(default = "default_pricing_model")]
    pub pricing_model: String,
}

const fn default_harness_timeout_ms() -> u64 {
    30_000
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_pricing_model() -> String {
    "gemini-1.5-pro".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_harness_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            record_metrics: default_true(),
            pricing_model: default_pricing_model(),
        }
    }
}
