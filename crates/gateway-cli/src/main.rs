//! `api-gateway` command-line entry point.

#![forbid(unsafe_code)]

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use gateway_telemetry::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => commands::serve(config, cli.verbose).await?,
        Commands::Check { config } => {
            init_logging(&LoggingConfig::new().with_verbose(cli.verbose))?;
            commands::check(config).await?;
        }
        Commands::Gen { path } => {
            init_logging(&LoggingConfig::new().with_verbose(cli.verbose))?;
            commands::gen(path).await?;
        }
        Commands::Version => commands::version(),
    }

    Ok(())
}
