//! Logging initialization.
//!
//! Logs always go to stderr so that `kino list` output on stdout stays clean.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Commands};

/// Initialize the logging subsystem based on CLI flags.
///
/// `--verbose` selects DEBUG, `--quiet` ERROR, otherwise INFO. Machine-readable
/// listing output drops to ERROR unless `--verbose` was given.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli))
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn log_level(cli: &Cli) -> Level {
    if cli.verbose {
        return Level::DEBUG;
    }
    if cli.quiet {
        return Level::ERROR;
    }
    match &cli.command {
        Commands::List { format, .. } if format.is_machine_readable() => Level::ERROR,
        _ => Level::INFO,
    }
}
