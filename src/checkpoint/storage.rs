//! Checkpoint operations over the active storage

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::info;

use super::{Checkpoint, CheckpointLog, CheckpointOutcome};
use crate::error::{Error, Result};
use crate::extension::ExtensionInstaller;
use crate::storage::import::{ConfigImporter, ImportListener, ImportSummary};
use crate::storage::{export_all, ConfigData, ConfigStorage, SharedStorage, Snapshot, DEFAULT_COLLECTION};

/// Read-only storage over a checkpoint snapshot
#[derive(Debug, Clone)]
pub struct SnapshotView {
    snapshot: Arc<Snapshot>,
    collection: String,
}

impl SnapshotView {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    fn objects(&self) -> Option<&BTreeMap<String, ConfigData>> {
        self.snapshot.get(&self.collection)
    }
}

fn read_only(operation: &str) -> Error {
    Error::ReadOnlyStorage {
        operation: operation.to_string(),
    }
}

impl ConfigStorage for SnapshotView {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects().is_some_and(|o| o.contains_key(name)))
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        Ok(self.objects().and_then(|o| o.get(name)).cloned())
    }

    fn write(&self, _name: &str, _data: &ConfigData) -> Result<()> {
        Err(read_only("write"))
    }

    fn delete(&self, _name: &str) -> Result<bool> {
        Err(read_only("delete"))
    }

    fn rename(&self, _name: &str, _new_name: &str) -> Result<()> {
        Err(read_only("rename"))
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects()
            .map(|o| o.keys().filter(|n| n.starts_with(prefix)).cloned().collect())
            .unwrap_or_default())
    }

    fn delete_all(&self, _prefix: &str) -> Result<()> {
        Err(read_only("delete_all"))
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            snapshot: Arc::clone(&self.snapshot),
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        Ok(self
            .snapshot
            .iter()
            .filter(|(name, objects)| name.as_str() != DEFAULT_COLLECTION && !objects.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

/// The active storage together with its checkpoint log
///
/// As a [`ConfigStorage`] it reads the active configuration, or the
/// configuration of a checkpoint once [`set_checkpoint_to_read_from`] was
/// called. Writes always go to the active storage.
///
/// [`set_checkpoint_to_read_from`]: CheckpointStorage::set_checkpoint_to_read_from
#[derive(Debug)]
pub struct CheckpointStorage {
    active: SharedStorage,
    /// Shared by every collection handle
    log: Arc<Mutex<CheckpointLog>>,
    read_from: Arc<Mutex<Option<SnapshotView>>>,
    collection: String,
}

impl CheckpointStorage {
    pub fn new(active: SharedStorage, log: CheckpointLog) -> Self {
        Self {
            active,
            log: Arc::new(Mutex::new(log)),
            read_from: Arc::new(Mutex::new(None)),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    fn log(&self) -> Result<MutexGuard<'_, CheckpointLog>> {
        self.log.lock().map_err(|_| Error::LockPoisoned {
            context: "checkpoint log".to_string(),
        })
    }

    fn reader(&self) -> Result<Option<Box<dyn ConfigStorage>>> {
        let guard = self.read_from.lock().map_err(|_| Error::LockPoisoned {
            context: "checkpoint reader".to_string(),
        })?;
        Ok(guard
            .as_ref()
            .map(|view| view.create_collection(&self.collection)))
    }

    fn active(&self) -> Box<dyn ConfigStorage> {
        self.active.create_collection(&self.collection)
    }

    /// Every checkpoint, oldest first
    pub fn checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.log()?.iter().cloned().collect())
    }

    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        Ok(self.log()?.latest().cloned())
    }

    pub fn has_label(&self, label: &str) -> Result<bool> {
        Ok(self.log()?.has_label(label))
    }

    /// Snapshot the active configuration.
    ///
    /// When it equals the latest checkpoint no entry is added and
    /// [`CheckpointOutcome::Unchanged`] carries that checkpoint. Otherwise the
    /// label must not be in use yet.
    pub fn checkpoint(&self, label: &str) -> Result<CheckpointOutcome> {
        let snapshot = export_all(self.active.as_ref())?;
        let mut log = self.log()?;

        if let Some(latest) = log.latest().cloned() {
            if log.snapshot(&latest.id)? == snapshot {
                info!(
                    "Configuration unchanged since checkpoint {} '{}'",
                    latest.id, latest.label
                );
                return Ok(CheckpointOutcome::Unchanged(latest));
            }
        }

        let checkpoint = log.append(label, snapshot)?;
        info!("Created checkpoint {} '{}'", checkpoint.id, checkpoint.label);
        Ok(CheckpointOutcome::Created(checkpoint))
    }

    /// The configuration as it was at a checkpoint
    pub fn read_at(&self, id: &str) -> Result<SnapshotView> {
        Ok(SnapshotView::new(self.log()?.snapshot(id)?))
    }

    /// Make reads through this storage return the state at a checkpoint;
    /// `None` goes back to reading the active configuration
    pub fn set_checkpoint_to_read_from(&self, id: Option<&str>) -> Result<()> {
        let view = match id {
            Some(id) => Some(self.read_at(id)?),
            None => None,
        };
        let mut guard = self.read_from.lock().map_err(|_| Error::LockPoisoned {
            context: "checkpoint reader".to_string(),
        })?;
        *guard = view;
        Ok(())
    }

    /// Make the active configuration equal to a checkpoint's snapshot.
    ///
    /// Runs a regular config import, so extensions are installed and
    /// uninstalled as needed. The log is left untouched.
    pub fn rollback_to(
        &self,
        id: &str,
        installer: &dyn ExtensionInstaller,
    ) -> Result<ImportSummary> {
        self.rollback_with_listeners(id, installer, Vec::new())
    }

    /// [`rollback_to`](Self::rollback_to) with import observers
    pub fn rollback_with_listeners<'a>(
        &self,
        id: &str,
        installer: &'a dyn ExtensionInstaller,
        listeners: Vec<Box<dyn ImportListener + 'a>>,
    ) -> Result<ImportSummary> {
        let source: SharedStorage = Arc::new(self.read_at(id)?);
        let mut importer = ConfigImporter::new(source, Arc::clone(&self.active), installer);
        for listener in listeners {
            importer = importer.with_listener(listener);
        }
        let summary = importer.import()?;
        self.set_checkpoint_to_read_from(None)?;
        info!("Rolled back to checkpoint {}", id);
        Ok(summary)
    }
}

impl ConfigStorage for CheckpointStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        match self.reader()? {
            Some(reader) => reader.exists(name),
            None => self.active().exists(name),
        }
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        match self.reader()? {
            Some(reader) => reader.read(name),
            None => self.active().read(name),
        }
    }

    fn write(&self, name: &str, data: &ConfigData) -> Result<()> {
        self.active().write(name, data)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        self.active().delete(name)
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        match self.reader()? {
            Some(reader) => reader.list_all(prefix),
            None => self.active().list_all(prefix),
        }
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            active: Arc::clone(&self.active),
            log: Arc::clone(&self.log),
            read_from: Arc::clone(&self.read_from),
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        match self.reader()? {
            Some(reader) => reader.all_collection_names(),
            None => self.active.all_collection_names(),
        }
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
