//! # Applying Recipes
//!
//! [`RecipeRunner`] applies a resolved recipe tree, dependencies first. For
//! each recipe it:
//!
//! 1.  **Installs extensions**: modules first, then themes, since themes may
//!     need modules. The recipe's config is passed to the installer as
//!     overrides, so an extension's default config object is replaced by the
//!     recipe's copy when the recipe ships one.
//! 2.  **Creates config**: every object in the recipe's config (its own
//!     `config/` directory plus imports) that does not exist yet is created
//!     and, if its schema asks for it, validated.
//! 3.  **Applies config actions** in manifest order.
//! 4.  **Content** is not imported; recipes carrying any are logged.
//!
//! The runner never undoes anything itself. A failure leaves whatever was
//! done so far in place; [`super::apply`] restores the pre-apply checkpoint.

use std::sync::Arc;

use log::{info, warn};

use super::{Recipe, RecipeConfigInstaller, RecipeTree};
use crate::action::ConfigActionManager;
use crate::error::Result;
use crate::extension::{ExtensionCatalog, ExtensionInstaller};
use crate::storage::{ConfigStorage, SharedStorage};
use crate::validation::ConfigValidator;

/// Applies recipes with injected collaborators
pub struct RecipeRunner<'a> {
    active: &'a dyn ConfigStorage,
    catalog: &'a ExtensionCatalog,
    installer: &'a dyn ExtensionInstaller,
    actions: &'a ConfigActionManager,
    validator: &'a dyn ConfigValidator,
}

impl<'a> RecipeRunner<'a> {
    pub fn new(
        active: &'a dyn ConfigStorage,
        catalog: &'a ExtensionCatalog,
        installer: &'a dyn ExtensionInstaller,
        actions: &'a ConfigActionManager,
        validator: &'a dyn ConfigValidator,
    ) -> Self {
        Self {
            active,
            catalog,
            installer,
            actions,
            validator,
        }
    }

    /// Apply every recipe of the tree in dependency order.
    ///
    /// Returns the ids of the applied recipes, root last.
    pub fn run(&self, tree: &RecipeTree) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for recipe in tree.execution_order() {
            self.process_recipe(recipe)?;
            applied.push(recipe.id.clone());
        }
        Ok(applied)
    }

    /// Apply one recipe, ignoring its dependencies
    pub fn process_recipe(&self, recipe: &Recipe) -> Result<()> {
        info!("Applying recipe {} ({})", recipe.name, recipe.id);
        self.process_install(recipe)?;
        self.process_configuration(recipe)?;
        self.process_content(recipe);
        Ok(())
    }

    fn process_install(&self, recipe: &Recipe) -> Result<()> {
        if recipe.install.is_empty() {
            return Ok(());
        }
        let overrides: SharedStorage = Arc::from(recipe.config.config_storage(self.catalog)?);

        // Themes can depend on modules so have to be installed after modules
        for name in recipe.install.modules.iter().chain(&recipe.install.themes) {
            self.installer
                .install(std::slice::from_ref(name), Some(Arc::clone(&overrides)))?;
        }
        Ok(())
    }

    fn process_configuration(&self, recipe: &Recipe) -> Result<()> {
        let storage = recipe.config.config_storage(self.catalog)?;
        RecipeConfigInstaller::new(self.active, self.validator).install_recipe_config(storage.as_ref())?;

        for action in &recipe.config.actions {
            info!(
                "Applying {} to {} from recipe {}",
                action.action_id, action.expression, recipe.id
            );
            self.actions
                .apply_action(&action.action_id, &action.expression, &action.value)?;
        }
        Ok(())
    }

    fn process_content(&self, recipe: &Recipe) {
        if recipe.has_content() {
            warn!(
                "Recipe {} carries content, which is not imported",
                recipe.id
            );
        }
    }
}
