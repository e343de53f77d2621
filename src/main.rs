//! nodeboot - Node bootstrap and cloud identity resolution
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use nodeboot::cli::{Cli, Commands};
use nodeboot::config::{Config, ConfigManager};
use nodeboot::error::NodebootResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> NodebootResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Bootstrap(args) => nodeboot::cli::commands::bootstrap(args, &config).await,
        Commands::Fetch(args) => nodeboot::cli::commands::fetch(args, &config).await,
        Commands::Identify(args) => nodeboot::cli::commands::identify(args, &config).await,
        Commands::Config(args) => {
            nodeboot::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("nodeboot=warn"),
        1 => EnvFilter::new("nodeboot=info"),
        _ => EnvFilter::new("nodeboot=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}
