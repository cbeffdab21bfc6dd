use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "api-gateway")]
#[command(about = "API gateway proxying requests to load-balanced backends with response caching")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway
    Serve {
        /// Configuration file (TOML, YAML or JSON)
        config: PathBuf,
    },
    /// Check that a configuration file is valid
    Check {
        /// Configuration file (TOML, YAML or JSON)
        config: PathBuf,
    },
    /// Write the example configuration
    Gen {
        /// Output path, must end in `.toml`
        #[arg(default_value = gateway_config::DEFAULT_EXAMPLE_PATH)]
        path: PathBuf,
    },
    /// Print version information
    Version,
}
