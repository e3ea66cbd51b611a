//! FlowLens CLI: extract node annotations and explainer videos from a
//! workflow marketplace page.
//!
//! Reads page markup and the workflow definition from disk (or fetches them),
//! runs one extraction, and prints the result as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
