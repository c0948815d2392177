//! ragline CLI — retrieval-augmented question answering over documentation.
//!
//! Builds typed component pipelines (fetch → convert → split → index →
//! retrieve → answer) and runs them against live documentation URLs.

mod builder;
mod commands;
mod standard;

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
