//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays the recipe
//! dependency tree in a hierarchical format.
//!
//! ## Functionality
//!
//! - **Dependency Visualization**: every recipe is shown under the recipe
//!   depending on it, in manifest order
//! - **Depth Control**: supports `--depth` to limit tree depth
//! - **Application Order**: `--order` also lists the recipes in the order
//!   they would be applied
//!
//! This command is a safe, read-only operation that does not modify the site.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::path::PathBuf;

use site_recipe::recipe::RecipeNode;

use crate::cli::GlobalOptions;
use crate::output::{emoji, OutputConfig};

/// Display the recipe dependency tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the recipe directory, the one holding recipe.yml
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the recipe itself, 1 to show its direct
    /// dependencies, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,

    /// Also list the recipes in application order
    #[arg(long)]
    pub order: bool,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, options: &GlobalOptions) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&options.color);
    let recipe_dir = super::recipe_dir(options, &args.path);
    println!(
        "{} Recipe dependency tree for: {}",
        emoji(&out, "🌳", "[TREE]"),
        recipe_dir.display()
    );

    let site = options.open_site()?;
    let tree = site
        .loader()
        .resolve(&recipe_dir)
        .map_err(|e| anyhow::anyhow!("Failed to resolve recipe dependencies: {}", e))?;

    let tree_root = build_tree_node(&tree.root, args.depth.unwrap_or(usize::MAX), 0);
    print_tree(&tree_root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

    if args.order {
        println!("\n{} Application order:", emoji(&out, "📋", "[ORDER]"));
        for (position, recipe) in tree.execution_order().iter().enumerate() {
            println!("   {}. {}", position + 1, recipe.id);
        }
    }

    Ok(())
}

fn build_tree_node(node: &RecipeNode, max_depth: usize, current_depth: usize) -> TreeNode {
    let label = format!("{} ({})", node.recipe.name, node.recipe.id);

    let children = if current_depth >= max_depth {
        vec![]
    } else {
        node.children
            .iter()
            .map(|child| build_tree_node(child, max_depth, current_depth + 1))
            .collect()
    };
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
