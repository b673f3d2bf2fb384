//! # Recipe Dependency Resolution
//!
//! A recipe lists the recipes it needs in `recipes`. Resolution loads the
//! whole graph into a [`RecipeTree`] and then flattens it into the order the
//! recipes are applied in.
//!
//! ## Process
//!
//! 1.  **Discovery**: starting at the root recipe, every dependency is found
//!     and loaded recursively. The recipes on the current path are tracked so
//!     that a recipe reached from itself is reported as a cycle instead of
//!     being loaded forever.
//! 2.  **Ordering**: the tree is traversed depth first, visiting
//!     dependencies before the recipe needing them (post-order). A recipe
//!     reached along several paths (a diamond) is applied once, at the first
//!     position the traversal reaches it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{Recipe, RecipeLoader};
use crate::error::{Error, Result};

/// A loaded recipe and the recipes it depends on
#[derive(Debug, Clone)]
pub struct RecipeNode {
    pub recipe: Recipe,
    /// Dependencies in manifest order
    pub children: Vec<RecipeNode>,
}

impl RecipeNode {
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: RecipeNode) {
        self.children.push(child);
    }
}

/// The dependency graph of a recipe, as a tree rooted at that recipe
#[derive(Debug, Clone)]
pub struct RecipeTree {
    pub root: RecipeNode,
}

impl RecipeTree {
    pub fn new(root: RecipeNode) -> Self {
        Self { root }
    }

    /// Recipes in application order: dependencies first, each recipe once
    pub fn execution_order(&self) -> Vec<&Recipe> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        build_order_recursive(&self.root, &mut order, &mut visited);
        order
    }
}

fn build_order_recursive<'a>(
    node: &'a RecipeNode,
    order: &mut Vec<&'a Recipe>,
    visited: &mut HashSet<String>,
) {
    if visited.contains(&node.recipe.id) {
        return;
    }
    for child in &node.children {
        build_order_recursive(child, order, visited);
    }
    visited.insert(node.recipe.id.clone());
    order.push(&node.recipe);
}

/// Load the recipe in `recipe_dir` and, recursively, every recipe it needs
pub fn resolve(loader: &RecipeLoader<'_>, recipe_dir: &Path) -> Result<RecipeTree> {
    let recipe = loader.load(recipe_dir)?;
    let root = build_node(loader, recipe, &mut Vec::new(), &mut HashMap::new())?;
    Ok(RecipeTree::new(root))
}

/// `built` holds finished subtrees by directory, so a recipe shared by
/// several dependents is loaded once
fn build_node(
    loader: &RecipeLoader<'_>,
    recipe: Recipe,
    path: &mut Vec<String>,
    built: &mut HashMap<PathBuf, RecipeNode>,
) -> Result<RecipeNode> {
    path.push(recipe.id.clone());
    let discovery = loader.discovery_for(&recipe.path);
    let mut node = RecipeNode::new(recipe);

    for dependency in node.recipe.recipes.clone() {
        if path.contains(&dependency) {
            return Err(cycle_error(path, &dependency));
        }
        let dir = discovery.find(&dependency)?;
        if let Some(child) = built.get(&dir) {
            node.add_child(child.clone());
            continue;
        }
        let child = build_node(loader, loader.load(&dir)?, path, built)?;
        built.insert(dir, child.clone());
        node.add_child(child);
    }

    path.pop();
    Ok(node)
}

fn cycle_error(path: &[String], repeated: &str) -> Error {
    let start = path.iter().position(|id| id == repeated).unwrap_or(0);
    let mut cycle: Vec<&str> = path[start..].iter().map(String::as_str).collect();
    cycle.push(repeated);
    Error::CircularDependency {
        cycle: cycle.join(" -> "),
    }
}

/// Order recipe ids so that every recipe comes after the recipes it needs.
///
/// `dependencies_of` returns the direct dependencies of one recipe. This is
/// the same traversal as [`RecipeTree::execution_order`] without loading
/// anything, for callers that only have names.
pub fn dependency_order<F>(root: &str, mut dependencies_of: F) -> Result<Vec<String>>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    visit(root, &mut dependencies_of, &mut Vec::new(), &mut visited, &mut order)?;
    Ok(order)
}

fn visit<F>(
    id: &str,
    dependencies_of: &mut F,
    path: &mut Vec<String>,
    visited: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    if path.iter().any(|p| p == id) {
        return Err(cycle_error(path, id));
    }
    if visited.contains(id) {
        return Ok(());
    }
    path.push(id.to_string());
    for dependency in dependencies_of(id)? {
        visit(&dependency, dependencies_of, path, visited, order)?;
    }
    path.pop();
    visited.insert(id.to_string());
    order.push(id.to_string());
    Ok(())
}
