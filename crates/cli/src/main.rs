mod cli;
mod commands;
mod config;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match cli.command {
        Commands::Catalog { command } => {
            let config = Config::load().await?;
            commands::catalog::handle_catalog_command(command, &config).await
        }
        Commands::Apps { command } => {
            let config = Config::load().await?;
            commands::apps::handle_apps_command(command, &config).await
        }
        Commands::Run { id, args } => {
            let config = Config::load().await?;
            commands::run::handle_run(&config, id, args).await
        }
        Commands::Open { app } => {
            let config = Config::load().await?;
            commands::run::handle_open(&config, app).await
        }
        Commands::Config { command } => commands::config::handle_config_command(command).await,
    }
}
