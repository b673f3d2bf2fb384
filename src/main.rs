//! # Site Recipe CLI
//!
//! This is the binary entry point for the `site-recipe` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging.
//! - Executing the appropriate command and turning errors into a message on
//!   stderr and a non-zero exit status.
//!
//! The recipe engine itself lives in the `site_recipe` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
