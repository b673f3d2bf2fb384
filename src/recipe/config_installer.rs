//! Creating the configuration a recipe ships

use std::collections::BTreeSet;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::storage::dependency::sort_by_dependencies;
use crate::storage::{ConfigStorage, DEFAULT_COLLECTION};
use crate::validation::ConfigValidator;

/// Writes recipe config into the active storage
///
/// Objects that already exist are left alone; the rest are created least
/// depended-upon first and then validated.
pub struct RecipeConfigInstaller<'a> {
    active: &'a dyn ConfigStorage,
    validator: &'a dyn ConfigValidator,
}

impl<'a> RecipeConfigInstaller<'a> {
    pub fn new(active: &'a dyn ConfigStorage, validator: &'a dyn ConfigValidator) -> Self {
        Self { active, validator }
    }

    /// Create every object of `source` missing from the active storage.
    ///
    /// Returns the created names in creation order. Fails with
    /// [`Error::InvalidConfig`] for the first created object with violations.
    pub fn install_recipe_config(&self, source: &dyn ConfigStorage) -> Result<Vec<String>> {
        let source = source.create_collection(DEFAULT_COLLECTION);
        let active = self.active.create_collection(DEFAULT_COLLECTION);

        let existing: BTreeSet<String> = active.list_all("")?.into_iter().collect();
        let list: Vec<String> = source
            .list_all("")?
            .into_iter()
            .filter(|name| !existing.contains(name))
            .collect();
        if list.is_empty() {
            return Ok(Vec::new());
        }

        let objects = source.read_multiple(&list)?;
        let order = sort_by_dependencies(&objects);
        for name in &order {
            if let Some(data) = objects.get(name) {
                debug!("Creating {}", name);
                active.write(name, data)?;
            }
        }

        for name in &order {
            let data = active.read(name)?.unwrap_or_default();
            let violations = self.validator.validate(name, &data)?;
            if !violations.is_empty() {
                return Err(Error::InvalidConfig {
                    name: name.clone(),
                    violations,
                });
            }
        }
        info!("Created {} config objects", order.len());
        Ok(order)
    }
}
