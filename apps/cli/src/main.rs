//! sheetsmith CLI: assemble cheat-sheet style documentation into a single
//! rendered document.
//!
//! Resolves includes, filters tag regions, substitutes attributes and writes
//! assembled AsciiDoc or print-ready HTML with a build manifest.

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
