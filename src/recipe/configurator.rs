//! What a recipe installs and which configuration it brings

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_yaml::Value;

use super::manifest::{ConfigSection, ImportSpec};
use crate::error::{Error, Result};
use crate::extension::{dependency_name, ExtensionCatalog, ExtensionKind};
use crate::storage::{ConfigData, ConfigStorage, FileStorage, MemoryStorage, MergedStorage};

/// Directory inside a recipe holding the config it ships
pub const CONFIG_DIRECTORY: &str = "config";

/// Keys that differ between sites without the config being different
const SITE_SPECIFIC_KEYS: [&str; 2] = ["uuid", "_core"];

/// The extensions a recipe installs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallConfigurator {
    /// Machine names as listed in the manifest
    pub extensions: Vec<String>,
    /// Modules to install, dependencies first; excludes installed ones
    pub modules: Vec<String>,
    /// Themes to install, base themes first; excludes installed ones
    pub themes: Vec<String>,
}

impl InstallConfigurator {
    pub fn new(
        extensions: &[String],
        catalog: &ExtensionCatalog,
        installed: &BTreeSet<String>,
    ) -> Result<Self> {
        let extensions: Vec<String> = extensions
            .iter()
            .map(|e| dependency_name(e).to_string())
            .collect();

        let mut order = Vec::new();
        for name in &extensions {
            collect_requirements(name, catalog, installed, &mut order)?;
        }

        let mut modules = Vec::new();
        let mut themes = Vec::new();
        for name in order {
            match catalog.get(&name).map(|e| e.kind) {
                Some(ExtensionKind::Theme) => themes.push(name),
                _ => modules.push(name),
            }
        }
        Ok(Self {
            extensions,
            modules,
            themes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.themes.is_empty()
    }
}

fn collect_requirements(
    name: &str,
    catalog: &ExtensionCatalog,
    installed: &BTreeSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if installed.contains(name) || order.iter().any(|n| n == name) {
        return Ok(());
    }
    let extension = catalog.get(name).ok_or_else(|| Error::UnknownExtension {
        name: name.to_string(),
    })?;
    // Marked before recursing so requirement cycles terminate
    order.push(name.to_string());
    let position = order.len() - 1;
    for requirement in extension.requirements() {
        collect_requirements(requirement, catalog, installed, order)?;
    }
    // Move after everything it requires
    let name = order.remove(position);
    order.push(name);
    Ok(())
}

/// One `action id: value` entry under a config name expression
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    pub expression: String,
    pub action_id: String,
    pub value: Value,
}

/// The configuration a recipe brings and the actions it applies
#[derive(Debug, Clone, Default)]
pub struct ConfigConfigurator {
    /// `<recipe>/config`, when the recipe ships config
    pub recipe_config_directory: Option<PathBuf>,
    pub import: BTreeMap<String, ImportSpec>,
    /// Actions in manifest order
    pub actions: Vec<ActionInvocation>,
}

/// Config data with the keys that never make two objects different removed
fn comparable(data: &ConfigData) -> ConfigData {
    let mut data = data.clone();
    for key in SITE_SPECIFIC_KEYS {
        data.remove(key);
    }
    let empty_dependencies = data
        .get("dependencies")
        .is_some_and(|d| d.is_null() || d.as_mapping().is_some_and(|m| m.is_empty()));
    if empty_dependencies {
        data.remove("dependencies");
    }
    data
}

impl ConfigConfigurator {
    /// Fails with [`Error::PreExistingConfig`] when config shipped in the
    /// recipe's own directory already exists in `active` with other content.
    pub fn new(
        section: ConfigSection,
        recipe_dir: &Path,
        recipe_id: &str,
        active: &dyn ConfigStorage,
    ) -> Result<Self> {
        let directory = recipe_dir.join(CONFIG_DIRECTORY);
        let recipe_config_directory = directory.is_dir().then_some(directory);

        if let Some(directory) = &recipe_config_directory {
            let recipe_storage = FileStorage::new(directory.clone());
            let mut mismatched = Vec::new();
            for name in recipe_storage.list_all("")? {
                let Some(existing) = active.read(&name)? else {
                    continue;
                };
                let shipped = recipe_storage.read(&name)?.unwrap_or_default();
                if comparable(&existing) != comparable(&shipped) {
                    mismatched.push(name);
                }
            }
            if !mismatched.is_empty() {
                return Err(Error::PreExistingConfig {
                    recipe: recipe_id.to_string(),
                    names: mismatched,
                });
            }
        }

        let mut actions = Vec::new();
        for (expression, invocations) in &section.actions {
            let (Some(expression), Some(invocations)) = (expression.as_str(), invocations.as_mapping())
            else {
                continue;
            };
            for (action_id, value) in invocations {
                if let Some(action_id) = action_id.as_str() {
                    actions.push(ActionInvocation {
                        expression: expression.to_string(),
                        action_id: action_id.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }

        Ok(Self {
            recipe_config_directory,
            import: section.import,
            actions,
        })
    }

    /// The recipe's config: its own directory first, then whatever it imports
    /// from extensions' default config
    pub fn config_storage(&self, catalog: &ExtensionCatalog) -> Result<Box<dyn ConfigStorage>> {
        let mut storages: Vec<Box<dyn ConfigStorage>> = Vec::new();
        if let Some(directory) = &self.recipe_config_directory {
            storages.push(Box::new(FileStorage::new(directory.clone())));
        }

        if !self.import.is_empty() {
            let imported = MemoryStorage::new();
            for (extension, spec) in &self.import {
                let extension = catalog.get(extension).ok_or_else(|| Error::UnknownExtension {
                    name: extension.clone(),
                })?;
                let defaults = extension.default_config_storage();
                let names = match spec {
                    ImportSpec::All(_) => defaults.list_all("")?,
                    ImportSpec::Names(names) => names.clone(),
                };
                for name in names {
                    match defaults.read(&name)? {
                        Some(data) => {
                            debug!("Importing {} from {}", name, extension.machine_name);
                            imported.write(&name, &data)?;
                        }
                        None => warn!(
                            "{} does not provide {}, nothing to import",
                            extension.machine_name, name
                        ),
                    }
                }
            }
            storages.push(Box::new(imported));
        }

        Ok(MergedStorage::from_storages(storages))
    }
}
