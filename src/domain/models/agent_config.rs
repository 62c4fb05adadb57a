//! Effective per-agent configuration.
//!
//! An [`AgentConfig`] is produced fresh by every resolution: compiled-in defaults are
//! layered with environment and feature-flag overrides, and optionally adapted to load
//! and complexity. Values are never mutated in place by callers.

use serde::{Deserialize, Serialize};

use super::agent::AgentName;

/// Runtime limits applied to each agent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Retry attempts after the first failure
    pub retries: u32,
    /// Maximum concurrent calls for this agent
    pub max_concurrency: usize,
    pub memory_limit: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: 3,
            max_concurrency: 5,
            memory_limit: "1Gi".to_string(),
        }
    }
}

/// Language model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    pub provider: String,
    pub model_name: String,
    /// Sampling temperature in `[0.0, 2.0]`
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "Google".to_string(),
            model_name: "gemini-1.5-pro-latest".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            top_p: None,
        }
    }
}

/// Prompt variant selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromptsConfig {
    pub default_variant: String,
    pub fallback_variant: String,
    pub ab_test_enabled: bool,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub traffic_split: Vec<f64>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default_variant: "v1".to_string(),
            fallback_variant: "fallback".to_string(),
            ab_test_enabled: false,
            variants: Vec::new(),
            traffic_split: Vec::new(),
        }
    }
}

/// Monitoring toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            tracing_enabled: true,
            log_level: "INFO".to_string(),
        }
    }
}

/// Resilience toggles driven by the `circuit_breaker` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResilienceConfig {
    pub circuit_breaker_enabled: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_enabled: true,
        }
    }
}

/// Complete configuration for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    pub name: AgentName,
    pub version: String,
    pub runtime: RuntimeConfig,
    pub model: ModelConfig,
    pub prompts: PromptsConfig,
    pub monitoring: MonitoringConfig,
    pub resilience: ResilienceConfig,
}

impl AgentConfig {
    /// Base configuration shared by every agent.
    pub fn base(name: AgentName) -> Self {
        Self {
            name,
            version: "1.0.0".to_string(),
            runtime: RuntimeConfig::default(),
            model: ModelConfig::default(),
            prompts: PromptsConfig::default(),
            monitoring: MonitoringConfig::default(),
            resilience: ResilienceConfig::default(),
        }
    }

    /// Compiled-in defaults for an agent, including its specific limits.
    pub fn defaults_for(name: AgentName) -> Self {
        let mut config = Self::base(name);
        match name {
            AgentName::Evaluator => {
                config.runtime.timeout_ms = 45_000;
                config.model.max_tokens = 4096;
            }
            AgentName::Context => {
                config.runtime.timeout_ms = 20_000;
                config.model.max_tokens = 1024;
            }
            AgentName::Orchestrator => {
                config.runtime.timeout_ms = 15_000;
                config.model.max_tokens = 512;
            }
            AgentName::Interviewer | AgentName::Synthesis => {}
        }
        config
    }
}

/// Why an adaptive resolution deviated from the resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adaptation {
    ReducedTimeoutAndTokensDueToHighLoad,
    ReducedTemperatureForLowComplexity,
    IncreasedTimeoutAndTokensForHighComplexity,
}

impl Adaptation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReducedTimeoutAndTokensDueToHighLoad => {
                "reduced_timeout_and_tokens_due_to_high_load"
            }
            Self::ReducedTemperatureForLowComplexity => "reduced_temperature_for_low_complexity",
            Self::IncreasedTimeoutAndTokensForHighComplexity => {
                "increased_timeout_and_tokens_for_high_complexity"
            }
        }
    }
}

/// A resolved configuration plus the audit trail of adjustments applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(flatten)]
    pub config: AgentConfig,
    pub adaptations: Vec<Adaptation>,
}
