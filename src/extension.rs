//! # Extensions
//!
//! Modules and themes are the installable units of a site. This module holds
//! the catalog of extensions available on disk and the installer that enables
//! and disables them.
//!
//! Installed state is not kept anywhere but configuration: the
//! `core.extension` object lists every installed module and theme. That is
//! what lets checkpoints and rollback cover extension state for free.
//!
//! ## Discovery
//!
//! An extension is a directory holding `<machine_name>.info.yml`:
//!
//! ```yaml
//! name: Node
//! type: module
//! dependencies:
//!   - drupal:text
//! config_entity_types:
//!   node_type:
//!     prefix: node.type
//! ```
//!
//! Default configuration lives in `config/install/` next to the info file and
//! schema files in `config/schema/`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::storage::dependency::sort_by_dependencies;
use crate::storage::{
    string_list, ConfigData, ConfigStorage, FileStorage, MemoryStorage, NullStorage,
    OverrideStorage, SharedStorage, DEFAULT_COLLECTION,
};
use crate::error::{Error, Result};

/// The config object recording installed extensions
pub const CORE_EXTENSION: &str = "core.extension";

const INFO_SUFFIX: &str = ".info.yml";

/// Directories under the application root scanned for extensions
pub const EXTENSION_DIRECTORIES: [&str; 4] = ["core/modules", "core/themes", "modules", "themes"];

/// Module or theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Module,
    Theme,
}

impl ExtensionKind {
    /// Key of this kind inside `core.extension`
    pub fn config_key(self) -> &'static str {
        match self {
            ExtensionKind::Module => "module",
            ExtensionKind::Theme => "theme",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

#[derive(Debug, Deserialize)]
struct InfoFile {
    name: String,
    #[serde(rename = "type")]
    kind: ExtensionKind,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(rename = "base theme")]
    base_theme: Option<String>,
    #[serde(default)]
    config_entity_types: BTreeMap<String, EntityTypeInfo>,
}

#[derive(Debug, Deserialize)]
struct EntityTypeInfo {
    prefix: String,
}

#[derive(Debug, Clone)]
enum DefaultConfig {
    None,
    Directory(PathBuf),
    Memory(MemoryStorage),
}

/// An available module or theme
#[derive(Debug, Clone)]
pub struct Extension {
    pub machine_name: String,
    pub label: String,
    pub kind: ExtensionKind,
    /// Machine names of required extensions
    pub dependencies: Vec<String>,
    pub base_theme: Option<String>,
    /// Config entity types provided: entity type id -> config prefix
    pub config_entity_types: BTreeMap<String, String>,
    pub path: Option<PathBuf>,
    default_config: DefaultConfig,
}

impl Extension {
    fn new(machine_name: &str, kind: ExtensionKind) -> Self {
        Self {
            machine_name: machine_name.to_string(),
            label: machine_name.to_string(),
            kind,
            dependencies: Vec::new(),
            base_theme: None,
            config_entity_types: BTreeMap::new(),
            path: None,
            default_config: DefaultConfig::None,
        }
    }

    /// An in-memory module with no default config
    pub fn module(machine_name: &str) -> Self {
        Self::new(machine_name, ExtensionKind::Module)
    }

    /// An in-memory theme with no default config
    pub fn theme(machine_name: &str) -> Self {
        Self::new(machine_name, ExtensionKind::Theme)
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dependencies = dependencies
            .into_iter()
            .map(|d| dependency_name(d.as_ref()).to_string())
            .collect();
        self
    }

    pub fn with_base_theme(mut self, base_theme: &str) -> Self {
        self.base_theme = Some(base_theme.to_string());
        self
    }

    pub fn with_entity_type(mut self, id: &str, prefix: &str) -> Self {
        self.config_entity_types
            .insert(id.to_string(), prefix.to_string());
        self
    }

    /// Add an object to the in-memory default config
    pub fn with_default_config(mut self, name: &str, yaml: &str) -> Result<Self> {
        let storage = match &self.default_config {
            DefaultConfig::Memory(storage) => storage.clone(),
            _ => MemoryStorage::new(),
        };
        storage.insert_yaml(name, yaml)?;
        self.default_config = DefaultConfig::Memory(storage);
        Ok(self)
    }

    /// Read an extension from its info file
    pub fn from_info_file(info_path: &Path) -> Result<Self> {
        let file_name = info_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let machine_name = file_name
            .strip_suffix(INFO_SUFFIX)
            .ok_or_else(|| Error::Config {
                name: info_path.display().to_string(),
                message: format!("extension info files must end in {}", INFO_SUFFIX),
            })?;

        let raw = fs::read_to_string(info_path)?;
        let info: InfoFile = serde_yaml::from_str(&raw).map_err(|e| Error::Config {
            name: info_path.display().to_string(),
            message: e.to_string(),
        })?;

        let directory = info_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let install_dir = directory.join("config").join("install");

        let mut extension = Self::new(machine_name, info.kind).with_dependencies(info.dependencies);
        extension.label = info.name;
        extension.base_theme = info.base_theme;
        extension.config_entity_types = info
            .config_entity_types
            .into_iter()
            .map(|(id, info)| (id, info.prefix))
            .collect();
        extension.default_config = if install_dir.is_dir() {
            DefaultConfig::Directory(install_dir)
        } else {
            DefaultConfig::None
        };
        extension.path = Some(directory);
        Ok(extension)
    }

    /// The extension's default configuration
    pub fn default_config_storage(&self) -> Box<dyn ConfigStorage> {
        match &self.default_config {
            DefaultConfig::None => Box::new(NullStorage::new()),
            DefaultConfig::Directory(dir) => Box::new(FileStorage::new(dir.clone())),
            DefaultConfig::Memory(storage) => Box::new(storage.clone()),
        }
    }

    /// Directory holding `*.schema.yml` files, if the extension lives on disk
    pub fn schema_directory(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|p| p.join("config").join("schema"))
            .filter(|p| p.is_dir())
    }

    /// Every extension that must be installed before this one
    pub fn requirements(&self) -> impl Iterator<Item = &String> {
        self.dependencies.iter().chain(self.base_theme.iter())
    }
}

/// The machine name part of a dependency string.
///
/// `drupal:node` and `node (>=10.1)` both name `node`.
pub fn dependency_name(dependency: &str) -> &str {
    let name = dependency
        .split_once(':')
        .map_or(dependency, |(_, name)| name);
    name.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or(name)
        .trim()
}

/// Every extension available to a site, keyed by machine name
#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    extensions: BTreeMap<String, Extension>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an extension
    pub fn insert(&mut self, extension: Extension) {
        self.extensions
            .insert(extension.machine_name.clone(), extension);
    }

    pub fn with(mut self, extension: Extension) -> Self {
        self.insert(extension);
        self
    }

    /// Scan the standard extension directories of an application root
    pub fn discover(root: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        for directory in EXTENSION_DIRECTORIES {
            let base = root.join(directory);
            if !base.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&base).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Config {
                    name: base.display().to_string(),
                    message: e.to_string(),
                })?;
                let is_info = entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|n| n.ends_with(INFO_SUFFIX));
                if !is_info {
                    continue;
                }
                let extension = Extension::from_info_file(entry.path())?;
                debug!(
                    "Discovered {} {} at {}",
                    extension.kind,
                    extension.machine_name,
                    entry.path().display()
                );
                // The first directory scanned wins
                if !catalog.contains(&extension.machine_name) {
                    catalog.insert(extension);
                }
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Enables and disables extensions
///
/// Both operations are idempotent: installing an installed extension or
/// uninstalling one that is not installed does nothing.
pub trait ExtensionInstaller {
    /// Install extensions and whatever they require.
    ///
    /// When `overrides` is given, any default config object it also contains
    /// is installed with its content instead.
    fn install(&self, names: &[String], overrides: Option<SharedStorage>) -> Result<()>;

    /// Uninstall extensions and delete the config they own
    fn uninstall(&self, names: &[String]) -> Result<()>;
}

/// Installed module and theme names recorded in `core.extension`
pub fn installed_extensions(storage: &dyn ConfigStorage) -> Result<BTreeSet<String>> {
    let storage = storage.create_collection(DEFAULT_COLLECTION);
    let Some(data) = storage.read(CORE_EXTENSION)? else {
        return Ok(BTreeSet::new());
    };
    let mut names = BTreeSet::new();
    for kind in [ExtensionKind::Module, ExtensionKind::Theme] {
        if let Some(list) = data.get(kind.config_key()).and_then(Value::as_mapping) {
            names.extend(list.keys().filter_map(|k| k.as_str().map(str::to_string)));
        }
    }
    Ok(names)
}

/// Installer that records state in the active storage's `core.extension`
#[derive(Debug, Clone)]
pub struct SiteInstaller {
    catalog: Arc<ExtensionCatalog>,
    active: SharedStorage,
}

impl SiteInstaller {
    pub fn new(catalog: Arc<ExtensionCatalog>, active: SharedStorage) -> Self {
        Self { catalog, active }
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    /// Whether an extension is currently installed
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(installed_extensions(self.active.as_ref())?.contains(name))
    }

    fn plan(
        &self,
        name: &str,
        installed: &BTreeSet<String>,
        order: &mut Vec<String>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        if installed.contains(name) || order.iter().any(|n| n == name) || path.iter().any(|n| n == name) {
            return Ok(());
        }
        let extension = self.catalog.get(name).ok_or_else(|| Error::UnknownExtension {
            name: name.to_string(),
        })?;
        path.push(name.to_string());
        for requirement in extension.requirements() {
            self.plan(requirement, installed, order, path)?;
        }
        path.pop();
        order.push(name.to_string());
        Ok(())
    }

    fn record(&self, extension: &Extension, installed: bool) -> Result<()> {
        let mut data = self.active.read(CORE_EXTENSION)?.unwrap_or_default();
        for kind in [ExtensionKind::Module, ExtensionKind::Theme] {
            let key = Value::from(kind.config_key());
            let mut list: BTreeMap<String, Value> = data
                .get(&key)
                .and_then(Value::as_mapping)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                        .collect()
                })
                .unwrap_or_default();
            if kind == extension.kind {
                if installed {
                    list.insert(extension.machine_name.clone(), Value::from(0));
                } else {
                    list.remove(&extension.machine_name);
                }
            }
            let list: Mapping = list
                .into_iter()
                .map(|(k, v)| (Value::from(k), v))
                .collect();
            data.insert(key, Value::Mapping(list));
        }
        self.active.write(CORE_EXTENSION, &data)
    }

    fn install_default_config(
        &self,
        extension: &Extension,
        overrides: Option<&SharedStorage>,
    ) -> Result<usize> {
        let defaults = extension.default_config_storage();
        let source: Box<dyn ConfigStorage> = match overrides {
            Some(overrides) => Box::new(OverrideStorage::new(Box::new(Arc::clone(overrides)), defaults)),
            None => defaults,
        };

        let mut collections = vec![DEFAULT_COLLECTION.to_string()];
        collections.extend(source.all_collection_names()?);

        let mut written = 0;
        for collection in collections {
            let source = source.create_collection(&collection);
            let target = self.active.create_collection(&collection);
            let objects = source.read_multiple(&source.list_all("")?)?;
            for name in sort_by_dependencies(&objects) {
                if target.exists(&name)? {
                    debug!("Skipping existing {} from {}", name, extension.machine_name);
                    continue;
                }
                if let Some(data) = objects.get(&name) {
                    target.write(&name, data)?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}

/// Whether a config object belongs to an extension
fn owned_by(name: &str, data: &ConfigData, extension: &Extension) -> bool {
    let provider = name.split('.').next().unwrap_or(name);
    if provider == extension.machine_name {
        return true;
    }
    let key = extension.kind.config_key();
    string_list(data, &format!("dependencies.{}", key)).contains(&extension.machine_name)
        || string_list(data, &format!("dependencies.enforced.{}", key))
            .contains(&extension.machine_name)
}

impl ExtensionInstaller for SiteInstaller {
    fn install(&self, names: &[String], overrides: Option<SharedStorage>) -> Result<()> {
        let installed = installed_extensions(self.active.as_ref())?;
        let mut order = Vec::new();
        for name in names {
            self.plan(name, &installed, &mut order, &mut Vec::new())?;
        }

        // Themes may need modules; modules never need themes
        let mut extensions = Vec::with_capacity(order.len());
        for name in &order {
            if let Some(extension) = self.catalog.get(name) {
                extensions.push(extension);
            }
        }
        extensions.sort_by_key(|e| e.kind);

        for extension in extensions {
            self.record(extension, true)?;
            let written = self.install_default_config(extension, overrides.as_ref())?;
            info!(
                "Installed {} {} ({} config objects)",
                extension.kind, extension.machine_name, written
            );
        }
        Ok(())
    }

    fn uninstall(&self, names: &[String]) -> Result<()> {
        let installed = installed_extensions(self.active.as_ref())?;
        for name in names {
            if !installed.contains(name) {
                continue;
            }
            let extension = self.catalog.get(name).ok_or_else(|| Error::UnknownExtension {
                name: name.to_string(),
            })?;

            let mut collections = vec![DEFAULT_COLLECTION.to_string()];
            collections.extend(self.active.all_collection_names()?);
            for collection in collections {
                let storage = self.active.create_collection(&collection);
                let objects = storage.read_multiple(&storage.list_all("")?)?;
                for (config_name, data) in &objects {
                    if config_name != CORE_EXTENSION && owned_by(config_name, data, extension) {
                        debug!("Deleting {} owned by {}", config_name, name);
                        storage.delete(config_name)?;
                    }
                }
            }

            self.record(extension, false)?;
            info!("Uninstalled {} {}", extension.kind, name);
        }
        Ok(())
    }
}
