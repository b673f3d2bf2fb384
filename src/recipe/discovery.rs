//! Finding recipes by name
//!
//! A recipe is referenced by its directory name. Discovery looks for
//! `<search path>/<name>/recipe.yml` in each search path in turn and returns
//! the first match.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde_yaml::Value;

use super::manifest::{self, MANIFEST_FILE};
use crate::error::{Error, Result};
use crate::extension::dependency_name;

/// Recipe roots below the application root, in priority order
pub const SEARCH_DIRECTORIES: [&str; 3] = ["recipes", "core/recipes", "core/tests/fixtures/recipes"];

/// An ordered list of directories holding recipes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDiscovery {
    search_paths: Vec<PathBuf>,
}

impl RecipeDiscovery {
    /// Search `paths` in order; repeated paths are searched once
    pub fn new<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut search_paths: Vec<PathBuf> = Vec::new();
        for path in paths {
            if !search_paths.contains(&path) {
                search_paths.push(path);
            }
        }
        Self { search_paths }
    }

    /// Search paths for the dependencies of the recipe in `recipe_dir`: the
    /// directory the recipe lives in, then the application's recipe roots.
    pub fn for_recipe(recipe_dir: &Path, app_root: &Path) -> Self {
        let sibling_root = recipe_dir.parent().map(Path::to_path_buf);
        Self::new(
            sibling_root
                .into_iter()
                .chain(SEARCH_DIRECTORIES.iter().map(|dir| app_root.join(dir))),
        )
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// The directory of the recipe called `name`
    pub fn find(&self, name: &str) -> Result<PathBuf> {
        let not_found = || Error::RecipeNotFound {
            recipe: name.to_string(),
            search_paths: self.search_paths.clone(),
        };

        // Names are single directory names, never paths
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(not_found());
        }

        for root in &self.search_paths {
            let candidate = root.join(name);
            if candidate.join(MANIFEST_FILE).is_file() {
                debug!("Found recipe {} in {}", name, root.display());
                return Ok(candidate);
            }
        }
        Err(not_found())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    /// Extensions installed by `recipes` and every recipe they depend on.
    ///
    /// Recipes that cannot be found or read are skipped; validating them is
    /// the job of their own load.
    pub fn extensions_installed_by(&self, recipes: &[String]) -> BTreeSet<String> {
        let mut extensions = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut pending: Vec<String> = recipes.to_vec();

        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Ok(dir) = self.find(&name) else {
                continue;
            };
            let Ok(data) = manifest::read(&dir.join(MANIFEST_FILE)) else {
                continue;
            };
            extensions.extend(
                strings(&data, "install")
                    .iter()
                    .map(|entry| dependency_name(entry).to_string()),
            );
            pending.extend(strings(&data, "recipes"));
        }
        extensions
    }
}

fn strings(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
