//! agent-reliability CLI entry point.

use anyhow::Result;
use clap::Parser;

use agent_reliability::cli::{self, Cli, Commands};
use agent_reliability::infrastructure::config::ConfigLoader;
use agent_reliability::infrastructure::logging::{LogConfig, LoggerImpl};
use agent_reliability::services::ConfigResolver;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }

    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;
    tracing::debug!(environment = %config.environment, "Configuration loaded");

    let resolver = ConfigResolver::from_config(&config);
    match cli.command {
        Commands::Config(args) => cli::commands::config::execute(args, &resolver, cli.json).await,
        Commands::Flags(args) => cli::commands::flags::execute(args, &resolver, cli.json).await,
    }
}
