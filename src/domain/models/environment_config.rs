//! Deployment-tier override tables.

use serde::{Deserialize, Serialize};

use super::agent::Environment;

/// API surface limits for a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentApiConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub concurrent_sessions: u32,
}

/// Model limits for a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentLlmConfig {
    pub default_model: String,
    /// Token ceiling applied to every agent's `max_tokens`
    pub max_tokens_per_request: u32,
    pub cost_limit_per_user: f64,
    pub cost_limit_per_session: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSecurityConfig {
    pub encryption_enabled: bool,
    pub key_rotation_days: u32,
    pub user_data_retention_days: u32,
    pub log_retention_days: u32,
    pub metrics_retention_days: u32,
}

impl Default for EnvironmentSecurityConfig {
    fn default() -> Self {
        Self {
            encryption_enabled: true,
            key_rotation_days: 90,
            user_data_retention_days: 730,
            log_retention_days: 90,
            metrics_retention_days: 365,
        }
    }
}

/// Everything that differs between development, staging and production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub environment: Environment,
    pub api: EnvironmentApiConfig,
    pub llm: EnvironmentLlmConfig,
    pub security: EnvironmentSecurityConfig,
}

impl EnvironmentConfig {
    /// Compiled-in table for a tier.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                environment,
                api: EnvironmentApiConfig {
                    base_url: "http://localhost:9002".to_string(),
                    requests_per_minute: 120,
                    requests_per_hour: 2000,
                    concurrent_sessions: 20,
                },
                llm: EnvironmentLlmConfig {
                    default_model: "gemini-1.5-pro-latest".to_string(),
                    max_tokens_per_request: 8192,
                    cost_limit_per_user: 5.00,
                    cost_limit_per_session: 2.00,
                },
                security: EnvironmentSecurityConfig {
                    encryption_enabled: false,
                    key_rotation_days: 365,
                    user_data_retention_days: 30,
                    log_retention_days: 7,
                    metrics_retention_days: 30,
                },
            },
            Environment::Staging => Self {
                environment,
                api: EnvironmentApiConfig {
                    base_url: "https://staging-api.interview-ai.com".to_string(),
                    requests_per_minute: 100,
                    requests_per_hour: 1500,
                    concurrent_sessions: 15,
                },
                llm: EnvironmentLlmConfig {
                    default_model: "gemini-1.5-pro-latest".to_string(),
                    max_tokens_per_request: 4096,
                    cost_limit_per_user: 2.00,
                    cost_limit_per_session: 1.00,
                },
                security: EnvironmentSecurityConfig::default(),
            },
            Environment::Production => Self {
                environment,
                api: EnvironmentApiConfig {
                    base_url: "https://api.interview-ai.com".to_string(),
                    requests_per_minute: 60,
                    requests_per_hour: 1000,
                    concurrent_sessions: 10,
                },
                llm: EnvironmentLlmConfig {
                    default_model: "gemini-1.5-pro-latest".to_string(),
                    max_tokens_per_request: 4096,
                    cost_limit_per_user: 1.00,
                    cost_limit_per_session: 0.50,
                },
                security: EnvironmentSecurityConfig::default(),
            },
        }
    }
}
