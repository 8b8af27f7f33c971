//! # CLI Structure and Argument Parsing
//!
//! `kino` has two modes:
//!
//! - **serve**: long-running HTTP service answering `GET /api/kino/:city`
//! - **list**: one-shot listing printed to stdout
//!
//! ```bash
//! kino serve --bind 0.0.0.0:8080
//! kino list --region sk
//! kino --quiet list --format json > listing.json
//! ```

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Main CLI structure for the `kino` command
#[derive(Parser, Clone, Debug)]
#[command(name = "kino")]
#[command(version)]
#[command(about = "Cinema showtimes and audience ratings from csfd.cz", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages (only errors are logged)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true, env = "KINO_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Serve the listing over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },

    /// Print the listing to stdout
    List {
        /// Only this region (for example `cz` or `sk`); bypasses the listing memo
        #[arg(long, value_name = "CODE")]
        region: Option<String>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
