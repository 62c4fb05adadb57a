//! Resolved configuration commands.

use anyhow::{ensure, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::table::detail_table;
use crate::domain::models::{
    Adaptation, AgentConfig, AgentName, ComplexityLevel, Environment, ReasoningStrategy,
};
use crate::services::ConfigResolver;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration for an agent
    Show {
        /// Agent name (orchestrator, context, interviewer, evaluator, synthesis)
        agent: AgentName,
    },
    /// Show the configuration adapted to complexity and system load
    Adapt {
        /// Agent name
        agent: AgentName,
        /// Declared complexity (low, medium, high, very_high)
        #[arg(long, default_value = "medium")]
        complexity: ComplexityLevel,
        /// Current system load between 0.0 and 1.0
        #[arg(long, default_value_t = 0.5)]
        load: f64,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub environment: Environment,
    pub config: AgentConfig,
    pub breaker_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_strategy: Option<ReasoningStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adaptations: Vec<Adaptation>,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        let c = &self.config;
        let mut rows: Vec<(&str, String)> = vec![
            ("environment", self.environment.to_string()),
            ("version", c.version.clone()),
            ("model", format!("{} / {}", c.model.provider, c.model.model_name)),
            ("temperature", format!("{:.2}", c.model.temperature)),
            ("max_tokens", c.model.max_tokens.to_string()),
            ("timeout_ms", c.runtime.timeout_ms.to_string()),
            ("retries", c.runtime.retries.to_string()),
            ("max_concurrency", c.runtime.max_concurrency.to_string()),
            ("prompt_variant", c.prompts.default_variant.clone()),
            ("metrics", on_off(c.monitoring.metrics_enabled)),
            ("tracing", on_off(c.monitoring.tracing_enabled)),
            ("circuit_breaker", on_off(self.breaker_enabled)),
        ];
        if let Some(strategy) = self.reasoning_strategy {
            rows.push(("reasoning", format!("{strategy:?}")));
        }
        if !self.adaptations.is_empty() {
            let applied: Vec<_> = self.adaptations.iter().map(Adaptation::as_str).collect();
            rows.push(("adaptations", applied.join(", ")));
        }

        format!(
            "{}\n{}",
            console::style(format!("Agent {}", c.name)).bold(),
            detail_table(rows)
        )
    }
}

fn on_off(enabled: bool) -> String {
    let label = if enabled { "on" } else { "off" };
    label.to_string()
}

pub async fn execute(args: ConfigArgs, resolver: &ConfigResolver, json_mode: bool) -> Result<()> {
    let result = match args.command {
        ConfigCommands::Show { agent } => ConfigOutput {
            environment: resolver.environment(),
            config: resolver.resolve_agent_config(agent).await,
            breaker_enabled: resolver.breaker_config(agent).await.config.enabled,
            complexity: None,
            system_load: None,
            reasoning_strategy: None,
            adaptations: Vec::new(),
        },
        ConfigCommands::Adapt {
            agent,
            complexity,
            load,
        } => {
            ensure!(
                (0.0..=1.0).contains(&load),
                "system load must be between 0.0 and 1.0, got {load}"
            );
            let adaptive = resolver.adapt(agent, complexity, load).await;
            ConfigOutput {
                environment: resolver.environment(),
                config: adaptive.config,
                breaker_enabled: resolver.breaker_config(agent).await.config.enabled,
                complexity: Some(complexity),
                system_load: Some(load),
                reasoning_strategy: Some(resolver.reasoning_strategy(agent, complexity).await),
                adaptations: adaptive.adaptations,
            }
        }
    };

    output(&result, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;

    #[tokio::test]
    async fn test_adapt_rejects_out_of_range_load() {
        let resolver = ConfigResolver::from_config(&Config::default());
        let args = ConfigArgs {
            command: ConfigCommands::Adapt {
                agent: AgentName::Evaluator,
                complexity: ComplexityLevel::High,
                load: 1.5,
            },
        };
        assert!(execute(args, &resolver, true).await.is_err());
    }

    #[tokio::test]
    async fn test_human_output_lists_adaptations() {
        let resolver = ConfigResolver::from_config(&Config::default());
        let adaptive = resolver
            .adapt(AgentName::Evaluator, ComplexityLevel::Low, 0.9)
            .await;
        let out = ConfigOutput {
            environment: Environment::Development,
            config: adaptive.config,
            breaker_enabled: false,
            complexity: Some(ComplexityLevel::Low),
            system_load: Some(0.9),
            reasoning_strategy: Some(ReasoningStrategy::Standard),
            adaptations: adaptive.adaptations,
        };
        let text = out.to_human();
        assert!(text.contains("reduced_timeout_and_tokens_due_to_high_load"));
        assert!(text.contains("reduced_temperature_for_low_complexity"));
        assert_eq!(out.to_json()["system_load"], 0.9);
    }
}
