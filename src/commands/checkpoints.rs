//! # Checkpoints Command Implementation
//!
//! This module implements the `checkpoints` subcommand, which lists the
//! site's checkpoint log, oldest first.

use anyhow::Result;
use clap::Args;

use site_recipe::checkpoint::Checkpoint;

use crate::cli::GlobalOptions;
use crate::output::{emoji, OutputConfig};

/// List the site's checkpoints
#[derive(Args, Debug)]
pub struct CheckpointsArgs {
    /// Only show the most recent checkpoint
    #[arg(long)]
    pub latest: bool,
}

/// Execute the `checkpoints` command.
pub fn execute(args: CheckpointsArgs, options: &GlobalOptions) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&options.color);
    let site = options.open_site()?;

    let checkpoints: Vec<Checkpoint> = if args.latest {
        site.checkpoints().latest()?.into_iter().collect()
    } else {
        site.checkpoints().checkpoints()?
    };

    if checkpoints.is_empty() {
        println!("{} No checkpoints", emoji(&out, "📭", "[INFO]"));
        return Ok(());
    }

    println!("{:<6} {:<12} LABEL", "ID", "TIMESTAMP");
    for checkpoint in &checkpoints {
        println!("{}", format_row(checkpoint));
    }
    Ok(())
}

fn format_row(checkpoint: &Checkpoint) -> String {
    format!(
        "{:<6} {:<12} {}",
        checkpoint.id, checkpoint.timestamp, checkpoint.label
    )
}
