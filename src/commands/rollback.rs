//! # Rollback Command Implementation
//!
//! This module implements the `rollback` subcommand, which makes the site's
//! active configuration equal to a checkpoint again. Extensions installed or
//! uninstalled since the checkpoint are uninstalled or installed back.
//!
//! The checkpoint log itself is left untouched, so rolling back can be
//! repeated or followed by a rollback to a later checkpoint.

use anyhow::Result;
use clap::Args;

use crate::cli::GlobalOptions;
use crate::output::{emoji, OutputConfig};

/// Roll the site's configuration back to a checkpoint
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Id of the checkpoint, as listed by `checkpoints`
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Execute the `rollback` command.
pub fn execute(args: RollbackArgs, options: &GlobalOptions) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&options.color);
    let site = options.open_site()?;

    let summary = site.rollback_to(&args.id)?;
    println!(
        "{}",
        out.success(&format!("Rolled back to checkpoint {}", args.id))
    );
    println!(
        "{} {} created, {} updated, {} deleted",
        emoji(&out, "📊", "[INFO]"),
        summary.created,
        summary.updated,
        summary.deleted
    );
    if !summary.installed.is_empty() {
        println!("   Installed: {}", summary.installed.join(", "));
    }
    if !summary.uninstalled.is_empty() {
        println!("   Uninstalled: {}", summary.uninstalled.join(", "));
    }
    Ok(())
}
