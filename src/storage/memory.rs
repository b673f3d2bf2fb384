//! In-memory configuration storage

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{decode_yaml, ConfigData, ConfigStorage, Snapshot, DEFAULT_COLLECTION};
use crate::error::{Error, Result};

/// In-memory storage for fast config manipulation
///
/// Clones share the same data. Each handle is scoped to one collection;
/// [`ConfigStorage::create_collection`] returns a handle to another collection
/// over the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Objects stored as collection -> name -> data
    data: Arc<RwLock<Snapshot>>,
    collection: String,
}

impl MemoryStorage {
    /// Create a new empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated with every collection of a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: Arc::new(RwLock::new(snapshot)),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Add or replace an object from YAML source
    pub fn insert_yaml(&self, name: &str, yaml: &str) -> Result<()> {
        let data = decode_yaml(yaml)?;
        self.write(name, &data)
    }

    /// Number of objects in this collection
    pub fn len(&self) -> usize {
        self.read_lock()
            .map(|data| data.get(&self.collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Check if this collection is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Snapshot>> {
        self.data.read().map_err(|_| Error::LockPoisoned {
            context: "memory storage read".to_string(),
        })
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Snapshot>> {
        self.data.write().map_err(|_| Error::LockPoisoned {
            context: "memory storage write".to_string(),
        })
    }
}

impl ConfigStorage for MemoryStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        let data = self.read_lock()?;
        Ok(data
            .get(&self.collection)
            .is_some_and(|objects| objects.contains_key(name)))
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        let data = self.read_lock()?;
        Ok(data
            .get(&self.collection)
            .and_then(|objects| objects.get(name))
            .cloned())
    }

    fn write(&self, name: &str, value: &ConfigData) -> Result<()> {
        let mut data = self.write_lock()?;
        data.entry(self.collection.clone())
            .or_default()
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let mut data = self.write_lock()?;
        let removed = match data.get_mut(&self.collection) {
            Some(objects) => objects.remove(name).is_some(),
            None => false,
        };
        // Empty non-default collections disappear, as they do on disk
        if self.collection != DEFAULT_COLLECTION
            && data.get(&self.collection).is_some_and(BTreeMap::is_empty)
        {
            data.remove(&self.collection);
        }
        Ok(removed)
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let data = self.read_lock()?;
        Ok(data
            .get(&self.collection)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|name| name.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            data: Arc::clone(&self.data),
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        let data = self.read_lock()?;
        Ok(data
            .iter()
            .filter(|(name, objects)| name.as_str() != DEFAULT_COLLECTION && !objects.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
