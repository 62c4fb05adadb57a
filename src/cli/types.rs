//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::config::ConfigArgs;
use crate::cli::commands::flags::FlagsArgs;
use crate::domain::models::Environment;

#[derive(Parser, Debug)]
#[command(name = "agent-reliability")]
#[command(about = "Circuit breakers, feature flags and validation suites for LLM agents", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .agent-reliability/
    #[arg(short, long, global = true, env = "AGENT_RELIABILITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured deployment environment
    #[arg(short, long, global = true)]
    pub environment: Option<Environment>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect resolved agent configuration
    Config(ConfigArgs),

    /// Inspect and evaluate feature flags
    Flags(FlagsArgs),
}
