//! Feature flag commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{detail_table, list_table, render_list};
use crate::domain::models::{AgentName, EvaluationContext, FeatureFlag, FlagEvaluation};
use crate::services::ConfigResolver;

#[derive(Args, Debug)]
pub struct FlagsArgs {
    #[command(subcommand)]
    pub command: FlagsCommands,
}

#[derive(Subcommand, Debug)]
pub enum FlagsCommands {
    /// List every feature flag
    List,
    /// Evaluate a flag for a user
    Eval {
        /// Flag name
        name: String,
        /// User id used as the rollout key
        #[arg(short, long)]
        user: String,
        /// Session id
        #[arg(short, long, default_value = "cli")]
        session: String,
        /// User segment (repeatable)
        #[arg(long = "segment")]
        segments: Vec<String>,
        /// Agent the evaluation is made for
        #[arg(short, long)]
        agent: Option<AgentName>,
    },
}

#[derive(Debug, Serialize)]
pub struct FlagListOutput {
    pub flags: Vec<FeatureFlag>,
    pub total: usize,
}

impl CommandOutput for FlagListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "enabled", "rollout", "environments", "description"]);
        for flag in &self.flags {
            let environments = flag.targeting.environment_filter.as_ref().map_or_else(
                || "all".to_string(),
                |envs| {
                    envs.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                },
            );
            table.add_row(vec![
                flag.name.clone(),
                flag.enabled.to_string(),
                format!("{}%", flag.targeting.percentage),
                environments,
                truncate(&flag.description, 48),
            ]);
        }
        render_list("Feature flags", &table, self.total, "No feature flags defined.")
    }
}

#[derive(Debug, Serialize)]
pub struct FlagEvalOutput {
    pub flag: String,
    pub context: EvaluationContext,
    #[serde(flatten)]
    pub evaluation: FlagEvaluation,
}

impl CommandOutput for FlagEvalOutput {
    fn to_human(&self) -> String {
        let verdict = if self.evaluation.enabled {
            console::style("enabled").green()
        } else {
            console::style("disabled").red()
        };
        let value = self
            .evaluation
            .value
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let rows = [
            ("user", self.context.user_id.clone()),
            ("environment", self.context.environment.to_string()),
            (
                "variant",
                self.evaluation.variant.clone().unwrap_or_default(),
            ),
            ("value", value),
        ];
        format!(
            "{} is {verdict}\n{}",
            console::style(&self.flag).bold(),
            detail_table(rows)
        )
    }
}

pub async fn execute(args: FlagsArgs, resolver: &ConfigResolver, json_mode: bool) -> Result<()> {
    match args.command {
        FlagsCommands::List => {
            let flags = resolver.feature_flags().await;
            let result = FlagListOutput {
                total: flags.len(),
                flags,
            };
            output(&result, json_mode);
        }
        FlagsCommands::Eval {
            name,
            user,
            session,
            segments,
            agent,
        } => {
            let mut context = EvaluationContext::new(user, session, resolver.environment());
            context.agent = agent;
            if !segments.is_empty() {
                context = context.with_segments(segments);
            }
            let evaluation = resolver.evaluate_flag(&name, &context).await;
            let result = FlagEvalOutput {
                flag: name,
                context,
                evaluation,
            };
            output(&result, json_mode);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Config, Environment};

    #[tokio::test]
    async fn test_list_shows_default_flags() {
        let resolver = ConfigResolver::from_config(&Config::default());
        let flags = resolver.feature_flags().await;
        let out = FlagListOutput {
            total: flags.len(),
            flags,
        };
        let text = out.to_human();
        assert!(text.contains("adaptive_reasoning"));
        assert!(text.contains("staging,production"));
        assert_eq!(out.to_json()["total"], 3);
    }

    #[tokio::test]
    async fn test_eval_output_flattens_evaluation() {
        let resolver = ConfigResolver::from_config(&Config::default());
        let context = EvaluationContext::new("u-1", "s-1", Environment::Development);
        let evaluation = resolver.evaluate_flag("missing", &context).await;
        let out = FlagEvalOutput {
            flag: "missing".to_string(),
            context,
            evaluation,
        };
        let json = out.to_json();
        assert_eq!(json["enabled"], false);
        assert_eq!(json["variant"], "unknown");
        assert!(out.to_human().contains("disabled"));
    }
}
