//! List command implementation

use anyhow::Result;
use kino_core::{Config, Listing, Orchestrator};
use std::sync::Arc;
use tracing::info;

use crate::output::{self, OutputFormat};

/// Execute the list command
pub async fn execute(config: &Config, region: Option<&str>, format: OutputFormat) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;

    let listing: Listing = match region {
        Some(code) => Arc::new(orchestrator.get_region(code).await?),
        None => orchestrator.get_all_cinemas().await?,
    };
    info!("Listing has {} cinemas", listing.len());

    print!("{}", output::render(&listing, format)?);
    if format.is_machine_readable() {
        println!();
    }
    Ok(())
}
