//! repath CLI: decide what to do with an item, here.
//!
//! Runs decisions against local knowledge packs and carries the pack
//! authoring tools (validation, manifest and search-index generation).

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
