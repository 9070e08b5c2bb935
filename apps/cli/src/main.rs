//! innscan CLI: enrich a list of taxpayer IDs from public registries.
//!
//! Looks every ID up in the bankruptcy registry, the arbitration court file
//! and the business registry, and stores the merged record locally.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = innscan_shared::load_config()?;
    commands::init_tracing(&cli, &config)?;
    commands::run(cli, config).await
}
