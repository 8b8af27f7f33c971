//! kino CLI - cinema showtimes and audience ratings from csfd.cz
//!
//! Entry point for the `kino` binary: parses arguments, sets up logging,
//! loads configuration and dispatches to the command implementations.

use anyhow::Result;
use clap::Parser;
use kino_core::Config;

mod cli;
mod commands;
mod output;
mod utils;

use cli::{Cli, Commands};
use utils::initialize_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    execute_command(cli.command, &config).await
}

async fn execute_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Serve { bind } => commands::serve(config, bind).await,
        Commands::List { region, format } => {
            commands::list(config, region.as_deref(), format).await
        },
    }
}
