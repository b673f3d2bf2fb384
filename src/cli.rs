//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use site_recipe::site::{Site, DEFAULT_SITE_PATH};

use crate::commands;

/// Site Recipe - Apply recipes to a site with checkpoint rollback
#[derive(Parser, Debug)]
#[command(name = "site-recipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Application root holding extensions, recipes and sites
    #[arg(long, global = true, value_name = "DIR", env = "SITE_RECIPE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Site directory, relative to the application root
    #[arg(long, global = true, value_name = "DIR", env = "SITE_RECIPE_SITE_PATH", default_value = DEFAULT_SITE_PATH)]
    site: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a recipe to the site
    Recipe(commands::recipe::RecipeArgs),
    /// Validate a recipe and its dependencies without applying it
    Validate(commands::validate::ValidateArgs),
    /// Display the recipe dependency tree
    Tree(commands::tree::TreeArgs),
    /// List the site's checkpoints
    Checkpoints(commands::checkpoints::CheckpointsArgs),
    /// Roll the site's configuration back to a checkpoint
    Rollback(commands::rollback::RollbackArgs),
    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

/// Options shared by every command that works on a site
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub root: PathBuf,
    pub site: PathBuf,
    pub color: String,
}

impl GlobalOptions {
    /// Open the site these options point at
    pub fn open_site(&self) -> Result<Site> {
        Site::open(&self.root, &self.site).map_err(|e| {
            anyhow::anyhow!(
                "Failed to open site {}: {}",
                self.root.join(&self.site).display(),
                e
            )
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let options = GlobalOptions {
            root: self.root,
            site: self.site,
            color: self.color,
        };

        match self.command {
            Commands::Recipe(args) => commands::recipe::execute(args, &options),
            Commands::Validate(args) => commands::validate::execute(args, &options),
            Commands::Tree(args) => commands::tree::execute(args, &options),
            Commands::Checkpoints(args) => commands::checkpoints::execute(args, &options),
            Commands::Rollback(args) => commands::rollback::execute(args, &options),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level`
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // Ignore a second initialization, e.g. when commands run in tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["site-recipe", "checkpoints"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        assert_eq!(cli.site, PathBuf::from(DEFAULT_SITE_PATH));
    }

    #[test]
    fn test_recipe_requires_path() {
        assert!(Cli::try_parse_from(["site-recipe", "recipe"]).is_err());
        let cli = Cli::try_parse_from(["site-recipe", "--root", "/app", "recipe", "recipes/a"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/app"));
    }
}
