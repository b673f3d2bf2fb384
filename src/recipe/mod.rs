//! # Recipes
//!
//! A recipe is a directory with a `recipe.yml` manifest and, optionally, a
//! `config/` directory of configuration objects. Loading a recipe validates
//! its manifest against the site (other recipes, available extensions,
//! registered config actions) without changing anything; an invalid recipe
//! never produces a [`Recipe`].
//!
//! ## Modules
//!
//! - [`manifest`]: decoding and validating `recipe.yml`.
//! - [`discovery`]: finding recipes by name in the search paths.
//! - [`configurator`]: the extensions a recipe installs and the config it
//!   brings.
//! - [`resolver`]: loading a recipe's dependencies and ordering them.
//! - [`config_installer`]: creating recipe config that does not exist yet.
//! - [`runner`]: applying recipes in order.
//! - [`apply`]: the checkpoint/rollback boundary around a run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde_yaml::Value;

use crate::action::ConfigActionManager;
use crate::error::Result;
use crate::extension::{installed_extensions, ExtensionCatalog};
use crate::storage::ConfigStorage;

pub mod apply;
pub mod config_installer;
pub mod configurator;
pub mod discovery;
pub mod manifest;
pub mod resolver;
pub mod runner;

pub use apply::{apply_recipe, backup_label, ApplyReport};
pub use config_installer::RecipeConfigInstaller;
pub use configurator::{ActionInvocation, ConfigConfigurator, InstallConfigurator};
pub use discovery::RecipeDiscovery;
pub use manifest::{Manifest, ManifestContext, MANIFEST_FILE};
pub use resolver::{RecipeNode, RecipeTree};
pub use runner::RecipeRunner;

/// A validated recipe
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Directory name, the name other recipes refer to it by
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: String,
    pub path: PathBuf,
    /// Recipes to apply first
    pub recipes: Vec<String>,
    pub install: InstallConfigurator,
    pub config: ConfigConfigurator,
    /// Default content; carried along but not imported
    pub content: Value,
}

impl Recipe {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    pub fn has_content(&self) -> bool {
        match &self.content {
            Value::Null => false,
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// Loads recipes against the current state of a site
#[derive(Debug, Clone, Copy)]
pub struct RecipeLoader<'a> {
    app_root: &'a Path,
    catalog: &'a ExtensionCatalog,
    active: &'a dyn ConfigStorage,
    actions: &'a ConfigActionManager,
}

impl<'a> RecipeLoader<'a> {
    pub fn new(
        app_root: &'a Path,
        catalog: &'a ExtensionCatalog,
        active: &'a dyn ConfigStorage,
        actions: &'a ConfigActionManager,
    ) -> Self {
        Self {
            app_root,
            catalog,
            active,
            actions,
        }
    }

    /// Where the dependencies of the recipe in `recipe_dir` are looked up
    pub fn discovery_for(&self, recipe_dir: &Path) -> RecipeDiscovery {
        RecipeDiscovery::for_recipe(recipe_dir, self.app_root)
    }

    /// Load and validate the recipe in `recipe_dir`
    pub fn load(&self, recipe_dir: &Path) -> Result<Recipe> {
        // `.` and `..` have no usable file name; a missing directory is left
        // as given so that it reports the missing manifest
        let recipe_dir = fs::canonicalize(recipe_dir).unwrap_or_else(|_| recipe_dir.to_path_buf());
        let recipe_dir = recipe_dir.as_path();
        let id = recipe_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let installed = installed_extensions(self.active)?;
        let discovery = self.discovery_for(recipe_dir);
        let context = LoaderContext {
            loader: self,
            discovery: &discovery,
            installed: &installed,
        };

        let manifest = manifest::parse(&recipe_dir.join(MANIFEST_FILE), &id, &context)?;
        let install = InstallConfigurator::new(&manifest.install, self.catalog, &installed)?;
        let config = ConfigConfigurator::new(manifest.config, recipe_dir, &id, self.active)?;

        debug!("Loaded recipe {} from {}", id, recipe_dir.display());
        Ok(Recipe {
            id,
            name: manifest.name,
            description: manifest.description,
            kind: manifest.kind,
            path: recipe_dir.to_path_buf(),
            recipes: manifest.recipes,
            install,
            config,
            content: manifest.content,
        })
    }

    /// Load the recipe in `recipe_dir` together with its dependencies
    pub fn resolve(&self, recipe_dir: &Path) -> Result<RecipeTree> {
        resolver::resolve(self, recipe_dir)
    }
}

struct LoaderContext<'l, 'a> {
    loader: &'l RecipeLoader<'a>,
    discovery: &'l RecipeDiscovery,
    installed: &'l BTreeSet<String>,
}

impl ManifestContext for LoaderContext<'_, '_> {
    fn recipe_exists(&self, name: &str) -> bool {
        self.discovery.exists(name)
    }

    fn extension_exists(&self, name: &str) -> bool {
        self.loader.catalog.contains(name)
    }

    fn available_extensions(&self, install: &[String], recipes: &[String]) -> BTreeSet<String> {
        let mut available = self.installed.clone();
        available.extend(install.iter().cloned());
        available.extend(self.discovery.extensions_installed_by(recipes));
        available
    }

    fn action_exists(&self, action_id: &str, config_name: &str) -> bool {
        self.loader
            .actions
            .resolve_action_id(action_id, config_name)
            .is_ok()
    }
}
