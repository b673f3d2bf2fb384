//! # Sites
//!
//! A [`Site`] wires the collaborators of the recipe engine together: the
//! active configuration, the available extensions, the installer, the config
//! action registry, the config validator and the checkpoint log.
//!
//! On disk a site is laid out as:
//!
//! ```text
//! <root>/
//!   core/modules/  core/themes/  modules/  themes/   extensions
//!   recipes/  core/recipes/                           recipes
//!   <site path>/config/                               active configuration
//!   <site path>/checkpoints/                          checkpoint log
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::action::ConfigActionManager;
use crate::checkpoint::{CheckpointLog, CheckpointStorage};
use crate::entity::EntityTypeManager;
use crate::error::{Error, Result};
use crate::extension::{ExtensionCatalog, SiteInstaller, CORE_EXTENSION};
use crate::recipe::{apply, ApplyReport, RecipeLoader, RecipeRunner};
use crate::storage::import::{ImportListener, ImportSummary};
use crate::storage::{decode_yaml, ConfigStorage, FileStorage, MemoryStorage, SharedStorage};
use crate::validation::{ConfigValidator, SchemaValidator};

/// Site directory used when none is given
pub const DEFAULT_SITE_PATH: &str = "sites/default";
/// Active configuration, inside the site directory
pub const CONFIG_DIRECTORY: &str = "config";
/// Checkpoint log, inside the site directory
pub const CHECKPOINT_DIRECTORY: &str = "checkpoints";

/// An installed site and everything needed to apply recipes to it
pub struct Site {
    root: PathBuf,
    active: SharedStorage,
    catalog: Arc<ExtensionCatalog>,
    installer: SiteInstaller,
    actions: ConfigActionManager,
    validator: Box<dyn ConfigValidator>,
    checkpoints: CheckpointStorage,
    import_listeners: Vec<Arc<dyn ImportListener>>,
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("root", &self.root)
            .field("active", &self.active)
            .field("extensions", &self.catalog.len())
            .finish()
    }
}

impl Site {
    /// Open the site at `<root>/<site_path>`.
    ///
    /// Recipes can only be applied to an installed site, so the active
    /// configuration must contain `core.extension`.
    pub fn open(root: impl Into<PathBuf>, site_path: &Path) -> Result<Self> {
        let root = root.into();
        let site_dir = root.join(site_path);
        let config_dir = site_dir.join(CONFIG_DIRECTORY);

        let active = FileStorage::new(config_dir.clone());
        if !active.exists(CORE_EXTENSION)? {
            return Err(Error::Config {
                name: CORE_EXTENSION.to_string(),
                message: format!(
                    "{} is not an installed site: {} has no {}.yml",
                    site_dir.display(),
                    config_dir.display(),
                    CORE_EXTENSION
                ),
            });
        }

        let catalog = ExtensionCatalog::discover(&root)?;
        debug!("Discovered {} extensions under {}", catalog.len(), root.display());
        let validator = SchemaValidator::from_catalog(&catalog)?;
        let log = CheckpointLog::open(site_dir.join(CHECKPOINT_DIRECTORY))?;
        Self::from_parts(root, Arc::new(active), catalog, log, Box::new(validator))
    }

    /// A site held in memory, with nothing installed yet
    pub fn in_memory(root: impl Into<PathBuf>, catalog: ExtensionCatalog) -> Result<Self> {
        let active = MemoryStorage::new();
        active.write(CORE_EXTENSION, &decode_yaml("module: {}\ntheme: {}\n")?)?;
        let validator = SchemaValidator::from_catalog(&catalog)?;
        Self::from_parts(
            root.into(),
            Arc::new(active),
            catalog,
            CheckpointLog::in_memory(),
            Box::new(validator),
        )
    }

    /// Assemble a site from its collaborators
    pub fn from_parts(
        root: PathBuf,
        active: SharedStorage,
        catalog: ExtensionCatalog,
        log: CheckpointLog,
        validator: Box<dyn ConfigValidator>,
    ) -> Result<Self> {
        let catalog = Arc::new(catalog);
        let entity_types = Arc::new(EntityTypeManager::from_catalog(&catalog));
        let installer = SiteInstaller::new(Arc::clone(&catalog), Arc::clone(&active));
        let actions = ConfigActionManager::with_core_actions(Arc::clone(&active), entity_types)?;
        let checkpoints = CheckpointStorage::new(Arc::clone(&active), log);
        Ok(Self {
            root,
            active,
            catalog,
            installer,
            actions,
            validator,
            checkpoints,
            import_listeners: Vec::new(),
        })
    }

    /// Replace the config validator
    pub fn with_validator(mut self, validator: Box<dyn ConfigValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Observe the config imports run by rollbacks
    pub fn with_import_listener(mut self, listener: Arc<dyn ImportListener>) -> Self {
        self.import_listeners.push(listener);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn active(&self) -> &SharedStorage {
        &self.active
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    pub fn installer(&self) -> &SiteInstaller {
        &self.installer
    }

    pub fn actions(&self) -> &ConfigActionManager {
        &self.actions
    }

    /// For registering additional config actions
    pub fn actions_mut(&mut self) -> &mut ConfigActionManager {
        &mut self.actions
    }

    pub fn checkpoints(&self) -> &CheckpointStorage {
        &self.checkpoints
    }

    pub fn is_installed(&self, extension: &str) -> Result<bool> {
        self.installer.is_installed(extension)
    }

    pub fn loader(&self) -> RecipeLoader<'_> {
        RecipeLoader::new(&self.root, &self.catalog, self.active.as_ref(), &self.actions)
    }

    pub fn runner(&self) -> RecipeRunner<'_> {
        RecipeRunner::new(
            self.active.as_ref(),
            &self.catalog,
            &self.installer,
            &self.actions,
            self.validator.as_ref(),
        )
    }

    /// Apply a recipe inside a checkpoint/rollback boundary
    pub fn apply_recipe(&self, recipe_dir: &Path) -> Result<ApplyReport> {
        apply::apply_recipe(self, recipe_dir)
    }

    /// Make the active configuration equal to a checkpoint
    pub fn rollback_to(&self, checkpoint_id: &str) -> Result<ImportSummary> {
        let listeners = self
            .import_listeners
            .iter()
            .map(|listener| Box::new(&**listener) as Box<dyn ImportListener + '_>)
            .collect();
        self.checkpoints
            .rollback_with_listeners(checkpoint_id, &self.installer, listeners)
    }
}
