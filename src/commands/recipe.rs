//! # Recipe Command Implementation
//!
//! This module implements the `recipe` subcommand, which applies a recipe to
//! the site.
//!
//! The recipe and all of its dependencies are loaded and validated first;
//! nothing changes if any of them is invalid. A backup checkpoint is then
//! taken and the recipes are applied, dependencies first. If applying fails,
//! the site's configuration is rolled back to the backup checkpoint and the
//! command exits with status 1.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::GlobalOptions;
use crate::output::OutputConfig;

/// Apply a recipe to the site
#[derive(Args, Debug)]
pub struct RecipeArgs {
    /// Path to the recipe directory, the one holding recipe.yml
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Execute the `recipe` command.
pub fn execute(args: RecipeArgs, options: &GlobalOptions) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&options.color);
    let recipe_dir = super::recipe_dir(options, &args.path);
    if !recipe_dir.is_dir() {
        anyhow::bail!("{} does not exist", recipe_dir.display());
    }

    let site = options.open_site()?;
    let report = site.apply_recipe(&recipe_dir)?;

    if let Some(notice) = report.notice() {
        println!("{}", out.notice(&notice));
    }
    println!("{}", out.success(&format!("{} applied successfully", report.recipe)));
    Ok(())
}
