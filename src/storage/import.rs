//! Comparing storages and importing the difference
//!
//! [`StorageComparer`] works out which objects must be created, updated or
//! deleted to make a target storage match a source storage, collection by
//! collection. [`ConfigImporter`] applies that change list.
//!
//! Import is the one path by which configuration is replaced wholesale: a
//! rollback to a checkpoint is an import whose source is the checkpoint's
//! snapshot. Extension state is part of configuration (`core.extension`), so
//! the importer first asks the installer to uninstall and install whatever
//! differs, then writes the remaining object changes.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use super::dependency::sort_by_dependencies;
use super::{ConfigStorage, SharedStorage, DEFAULT_COLLECTION};
use crate::error::{Error, Result};
use crate::extension::{installed_extensions, ExtensionInstaller, CORE_EXTENSION};

/// Objects to create, update and delete in one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
}

impl ChangeList {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Computes the change lists that turn `target` into `source`
#[derive(Debug)]
pub struct StorageComparer<'a> {
    source: &'a dyn ConfigStorage,
    target: &'a dyn ConfigStorage,
    changes: BTreeMap<String, ChangeList>,
}

impl<'a> StorageComparer<'a> {
    pub fn new(source: &'a dyn ConfigStorage, target: &'a dyn ConfigStorage) -> Self {
        Self {
            source,
            target,
            changes: BTreeMap::new(),
        }
    }

    /// Discard any computed changes and compare the storages again
    pub fn reset(&mut self) -> Result<&mut Self> {
        self.changes.clear();
        self.create_change_list()?;
        Ok(self)
    }

    /// Compare every collection present in either storage
    pub fn create_change_list(&mut self) -> Result<&mut Self> {
        let mut collections: BTreeSet<String> = BTreeSet::new();
        collections.insert(DEFAULT_COLLECTION.to_string());
        collections.extend(self.source.all_collection_names()?);
        collections.extend(self.target.all_collection_names()?);

        for collection in collections {
            let source = self.source.create_collection(&collection);
            let target = self.target.create_collection(&collection);
            let list = compare_collection(source.as_ref(), target.as_ref())?;
            if !list.is_empty() {
                self.changes.insert(collection, list);
            }
        }
        Ok(self)
    }

    /// Whether anything differs
    pub fn has_changes(&self) -> bool {
        self.changes.values().any(|list| !list.is_empty())
    }

    /// The change list for one collection
    pub fn change_list(&self, collection: &str) -> Option<&ChangeList> {
        self.changes.get(collection)
    }

    /// Collections with changes, in name order
    pub fn collections(&self) -> impl Iterator<Item = &String> {
        self.changes.keys()
    }
}

fn compare_collection(source: &dyn ConfigStorage, target: &dyn ConfigStorage) -> Result<ChangeList> {
    let source_names = source.list_all("")?;
    let target_names = target.list_all("")?;
    let source_data = source.read_multiple(&source_names)?;
    let target_data = target.read_multiple(&target_names)?;

    let mut list = ChangeList::default();

    // Creates in dependency order, deletes in reverse dependency order
    let to_create: BTreeMap<_, _> = source_data
        .iter()
        .filter(|(name, _)| !target_data.contains_key(*name))
        .map(|(name, data)| (name.clone(), data.clone()))
        .collect();
    list.create = sort_by_dependencies(&to_create);

    let to_delete: BTreeMap<_, _> = target_data
        .iter()
        .filter(|(name, _)| !source_data.contains_key(*name))
        .map(|(name, data)| (name.clone(), data.clone()))
        .collect();
    list.delete = sort_by_dependencies(&to_delete);
    list.delete.reverse();

    list.update = source_data
        .iter()
        .filter(|(name, data)| target_data.get(*name).is_some_and(|current| current != *data))
        .map(|(name, _)| name.clone())
        .collect();

    Ok(list)
}

/// A step of an import, reported to every [`ImportListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// The source passed the importer's own checks; listeners may veto
    Validate,
    Uninstalled { name: String },
    Installed { name: String },
    Delete { collection: String, name: String },
    Create { collection: String, name: String },
    Update { collection: String, name: String },
    /// The import finished
    Imported,
}

/// Observer of import steps
///
/// Returning an error from [`ImportEvent::Validate`] aborts the import before
/// anything is written.
pub trait ImportListener {
    fn on_event(&self, event: &ImportEvent) -> Result<()>;
}

impl<L: ImportListener + ?Sized> ImportListener for &L {
    fn on_event(&self, event: &ImportEvent) -> Result<()> {
        (**self).on_event(event)
    }
}

/// Totals of a finished import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub installed: Vec<String>,
    pub uninstalled: Vec<String>,
}

/// Applies the difference between a source storage and the active storage
pub struct ConfigImporter<'a> {
    source: SharedStorage,
    target: SharedStorage,
    installer: &'a dyn ExtensionInstaller,
    listeners: Vec<Box<dyn ImportListener + 'a>>,
}

impl<'a> ConfigImporter<'a> {
    pub fn new(
        source: SharedStorage,
        target: SharedStorage,
        installer: &'a dyn ExtensionInstaller,
    ) -> Self {
        Self {
            source,
            target,
            installer,
            listeners: Vec::new(),
        }
    }

    /// Register an observer of import steps
    pub fn with_listener(mut self, listener: Box<dyn ImportListener + 'a>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn dispatch(&self, event: ImportEvent) -> Result<()> {
        for listener in &self.listeners {
            listener.on_event(&event)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let source = self.source.create_collection(DEFAULT_COLLECTION);
        if !source.exists(CORE_EXTENSION)? {
            return Err(Error::ConfigImport {
                message: "The core.extension configuration does not exist.".to_string(),
            });
        }
        self.dispatch(ImportEvent::Validate)
    }

    /// Run the import
    pub fn import(&self) -> Result<ImportSummary> {
        self.validate()?;
        let mut summary = ImportSummary::default();

        self.process_extensions(&mut summary)?;

        let mut comparer = StorageComparer::new(self.source.as_ref(), self.target.as_ref());
        comparer.create_change_list()?;

        let collections: Vec<String> = comparer.collections().cloned().collect();
        for collection in collections {
            let Some(list) = comparer.change_list(&collection) else {
                continue;
            };
            let source = self.source.create_collection(&collection);
            let target = self.target.create_collection(&collection);

            for name in &list.delete {
                debug!("Import: deleting {} [{}]", name, collection);
                target.delete(name)?;
                summary.deleted += 1;
                self.dispatch(ImportEvent::Delete {
                    collection: collection.clone(),
                    name: name.clone(),
                })?;
            }
            for name in &list.create {
                debug!("Import: creating {} [{}]", name, collection);
                write_from(source.as_ref(), target.as_ref(), name)?;
                summary.created += 1;
                self.dispatch(ImportEvent::Create {
                    collection: collection.clone(),
                    name: name.clone(),
                })?;
            }
            for name in &list.update {
                debug!("Import: updating {} [{}]", name, collection);
                write_from(source.as_ref(), target.as_ref(), name)?;
                summary.updated += 1;
                self.dispatch(ImportEvent::Update {
                    collection: collection.clone(),
                    name: name.clone(),
                })?;
            }
        }

        info!(
            "Imported configuration: {} created, {} updated, {} deleted",
            summary.created, summary.updated, summary.deleted
        );
        self.dispatch(ImportEvent::Imported)?;
        Ok(summary)
    }

    fn process_extensions(&self, summary: &mut ImportSummary) -> Result<()> {
        let wanted = installed_extensions(self.source.as_ref())?;
        let current = installed_extensions(self.target.as_ref())?;

        let uninstall: Vec<String> = current.difference(&wanted).cloned().collect();
        let install: Vec<String> = wanted.difference(&current).cloned().collect();

        if !uninstall.is_empty() {
            info!("Import: uninstalling {}", uninstall.join(", "));
            self.installer.uninstall(&uninstall)?;
            for name in &uninstall {
                self.dispatch(ImportEvent::Uninstalled { name: name.clone() })?;
            }
        }
        if !install.is_empty() {
            info!("Import: installing {}", install.join(", "));
            self.installer.install(&install, Some(self.source.clone()))?;
            for name in &install {
                self.dispatch(ImportEvent::Installed { name: name.clone() })?;
            }
        }

        summary.uninstalled = uninstall;
        summary.installed = install;
        Ok(())
    }
}

fn write_from(source: &dyn ConfigStorage, target: &dyn ConfigStorage, name: &str) -> Result<()> {
    let data = source.read(name)?.ok_or_else(|| Error::ConfigImport {
        message: format!("{} disappeared from the source storage during import", name),
    })?;
    target.write(name, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn storage(objects: &[(&str, &str)]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        for (name, yaml) in objects {
            storage.insert_yaml(name, yaml).unwrap();
        }
        storage
    }

    #[test]
    fn test_comparer_finds_creates_updates_deletes() {
        let source = storage(&[("a.keep", "x: 1"), ("a.change", "x: 2"), ("a.new", "x: 3")]);
        let target = storage(&[("a.keep", "x: 1"), ("a.change", "x: 1"), ("a.old", "x: 0")]);

        let mut comparer = StorageComparer::new(&source, &target);
        comparer.create_change_list().unwrap();
        assert!(comparer.has_changes());

        let list = comparer.change_list(DEFAULT_COLLECTION).unwrap();
        assert_eq!(list.create, vec!["a.new"]);
        assert_eq!(list.update, vec!["a.change"]);
        assert_eq!(list.delete, vec!["a.old"]);
    }

    #[test]
    fn test_comparer_key_order_is_not_a_change() {
        let source = storage(&[("a.b", "x: 1\ny: 2\n")]);
        let target = storage(&[("a.b", "y: 2\nx: 1\n")]);
        let mut comparer = StorageComparer::new(&source, &target);
        comparer.reset().unwrap();
        assert!(!comparer.has_changes());
    }

    #[test]
    fn test_comparer_covers_collections() {
        let source = MemoryStorage::new();
        source
            .create_collection("language.fr")
            .write("system.site", &crate::storage::decode_yaml("name: fr").unwrap())
            .unwrap();
        let target = MemoryStorage::new();

        let mut comparer = StorageComparer::new(&source, &target);
        comparer.create_change_list().unwrap();
        assert_eq!(
            comparer.change_list("language.fr").unwrap().create,
            vec!["system.site"]
        );
        assert!(comparer.change_list(DEFAULT_COLLECTION).is_none());
    }
}
