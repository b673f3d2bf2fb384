//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which loads a recipe
//! and all of its dependencies exactly as `recipe` would, without applying
//! anything.
//!
//! ## Checks
//!
//! - **Manifest Validation**: every manifest in the dependency graph is
//!   checked and all violations are reported together.
//! - **Dependency Resolution**: dependencies are discovered and cycles are
//!   reported.
//! - **Pre-existing Config**: config the recipe would create must not already
//!   exist with different content.
//!
//! This command is a safe, read-only operation that does not modify the site.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use site_recipe::recipe::RecipeTree;

use crate::cli::GlobalOptions;
use crate::output::{emoji, OutputConfig};

/// Validate a recipe without applying it
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the recipe directory, the one holding recipe.yml
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, options: &GlobalOptions) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&options.color);
    let recipe_dir = super::recipe_dir(options, &args.path);
    println!(
        "{} Validating recipe: {}",
        emoji(&out, "🔍", "[SCAN]"),
        recipe_dir.display()
    );

    let site = options.open_site()?;
    let tree = match site.loader().resolve(&recipe_dir) {
        Ok(tree) => {
            println!("{} Recipe is valid", emoji(&out, "✅", "[OK]"));
            tree
        }
        Err(e) => {
            println!("{} Recipe is invalid", emoji(&out, "❌", "[ERR]"));
            return Err(e.into());
        }
    };

    print_summary(&out, &tree);
    Ok(())
}

fn print_summary(out: &OutputConfig, tree: &RecipeTree) {
    let order = tree.execution_order();
    println!("\n{} Recipe Summary:", emoji(out, "📊", "[INFO]"));
    println!("   Name: {}", tree.root.recipe.name);
    println!("   Recipes to apply: {}", order.len());
    for (position, recipe) in order.iter().enumerate() {
        println!("     {}. {} ({})", position + 1, recipe.name, recipe.id);
    }

    let mut extensions: Vec<&str> = Vec::new();
    for recipe in &order {
        for name in &recipe.install.extensions {
            if !extensions.contains(&name.as_str()) {
                extensions.push(name);
            }
        }
    }
    if extensions.is_empty() {
        println!("   Extensions to install: none");
    } else {
        println!("   Extensions to install: {}", extensions.join(", "));
    }

    let actions: usize = order.iter().map(|r| r.config.actions.len()).sum();
    println!("   Config actions: {}", actions);

    let with_content: Vec<&str> = order
        .iter()
        .filter(|r| r.has_content())
        .map(|r| r.id.as_str())
        .collect();
    if !with_content.is_empty() {
        println!(
            "{} Default content is not imported: {}",
            emoji(out, "⚠️", "[WARN]"),
            with_content.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::AppRoot;

    #[test]
    fn test_execute_valid_recipe_changes_nothing() {
        let app = AppRoot::new()
            .with_recipe("base", "name: Base\ninstall:\n  - node\n")
            .with_recipe("top", "name: Top\nrecipes:\n  - base\n");
        let args = ValidateArgs {
            path: app.recipe("top"),
        };
        execute(args, &app.options()).unwrap();

        let site = app.options().open_site().unwrap();
        assert!(!site.is_installed("node").unwrap());
        assert!(site.checkpoints().checkpoints().unwrap().is_empty());
    }

    #[test]
    fn test_execute_reports_cycle() {
        let app = AppRoot::new()
            .with_recipe("a", "name: A\nrecipes:\n  - b\n")
            .with_recipe("b", "name: B\nrecipes:\n  - a\n");
        let args = ValidateArgs {
            path: app.recipe("a"),
        };
        let err = execute(args, &app.options()).unwrap_err();
        assert!(err.to_string().contains("Circular recipe dependency detected"));
    }

    #[test]
    fn test_execute_missing_dependency() {
        let app = AppRoot::new().with_recipe("lonely", "name: Lonely\nrecipes:\n  - ghost\n");
        let args = ValidateArgs {
            path: app.recipe("lonely"),
        };
        let err = execute(args, &app.options()).unwrap_err();
        assert!(err.to_string().contains("The ghost recipe does not exist."));
    }
}
