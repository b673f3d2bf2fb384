//! # Checkpoints
//!
//! A checkpoint is a labelled snapshot of every config object in every
//! collection. Checkpoints form a linear, append-only log: ids are sequence
//! numbers, nothing is ever removed and rolling back does not rewrite
//! history.
//!
//! The log can live in memory or on disk. On disk it is a directory with:
//!
//! - `index.json`: the list of checkpoints (id, label, timestamp, parent)
//! - `<id>.yml`: the full snapshot taken for that checkpoint
//!
//! [`CheckpointStorage`] couples a log with the active storage and provides
//! the checkpoint, read-at and rollback operations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Snapshot;

pub mod storage;

pub use storage::{CheckpointStorage, SnapshotView};

const INDEX_FILE: &str = "index.json";

/// One entry of the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub label: String,
    /// Seconds since the UNIX epoch
    pub timestamp: u64,
    /// The checkpoint before this one
    pub parent: Option<String>,
}

/// Result of asking for a new checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Created(Checkpoint),
    /// Nothing changed since the latest checkpoint, which is returned
    Unchanged(Checkpoint),
}

impl CheckpointOutcome {
    /// The checkpoint describing the current configuration
    pub fn checkpoint(&self) -> &Checkpoint {
        match self {
            CheckpointOutcome::Created(cp) | CheckpointOutcome::Unchanged(cp) => cp,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CheckpointOutcome::Created(_))
    }
}

#[derive(Debug)]
enum Backend {
    Memory(BTreeMap<String, Snapshot>),
    Directory(PathBuf),
}

/// The ordered list of checkpoints and their snapshots
#[derive(Debug)]
pub struct CheckpointLog {
    entries: Vec<Checkpoint>,
    backend: Backend,
}

pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl CheckpointLog {
    /// An empty log kept in memory
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            backend: Backend::Memory(BTreeMap::new()),
        }
    }

    /// Open the log stored in a directory, creating nothing until the first
    /// checkpoint is written
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        let index = directory.join(INDEX_FILE);
        let entries = if index.is_file() {
            let raw = fs::read_to_string(&index)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };
        Ok(Self {
            entries,
            backend: Backend::Directory(directory),
        })
    }

    /// Where the log is stored, `None` for an in-memory log
    pub fn directory(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Memory(_) => None,
            Backend::Directory(dir) => Some(dir),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checkpoints oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.entries.last()
    }

    pub fn get(&self, id: &str) -> Result<&Checkpoint> {
        self.entries
            .iter()
            .find(|cp| cp.id == id)
            .ok_or_else(|| Error::UnknownCheckpoint { id: id.to_string() })
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.entries.iter().any(|cp| cp.label == label)
    }

    fn next_id(&self) -> String {
        let highest = self
            .entries
            .iter()
            .filter_map(|cp| cp.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (highest + 1).to_string()
    }

    /// Append a checkpoint holding `snapshot`
    pub fn append(&mut self, label: &str, snapshot: Snapshot) -> Result<Checkpoint> {
        if self.has_label(label) {
            return Err(Error::CheckpointExists {
                label: label.to_string(),
            });
        }
        let checkpoint = Checkpoint {
            id: self.next_id(),
            label: label.to_string(),
            timestamp: now(),
            parent: self.latest().map(|cp| cp.id.clone()),
        };

        match &mut self.backend {
            Backend::Memory(snapshots) => {
                snapshots.insert(checkpoint.id.clone(), snapshot);
            }
            Backend::Directory(dir) => {
                fs::create_dir_all(&*dir)?;
                let path = dir.join(format!("{}.yml", checkpoint.id));
                fs::write(&path, serde_yaml::to_string(&snapshot)?)?;
            }
        }
        self.entries.push(checkpoint.clone());
        self.save_index()?;
        debug!("Appended checkpoint {} '{}'", checkpoint.id, checkpoint.label);
        Ok(checkpoint)
    }

    fn save_index(&self) -> Result<()> {
        if let Backend::Directory(dir) = &self.backend {
            let json = serde_json::to_string_pretty(&self.entries)?;
            fs::write(dir.join(INDEX_FILE), json)?;
        }
        Ok(())
    }

    /// The snapshot taken for a checkpoint
    pub fn snapshot(&self, id: &str) -> Result<Snapshot> {
        if self.is_empty() {
            return Err(Error::NoCheckpoints);
        }
        let checkpoint = self.get(id)?;
        match &self.backend {
            Backend::Memory(snapshots) => snapshots
                .get(&checkpoint.id)
                .cloned()
                .ok_or_else(|| Error::UnknownCheckpoint { id: id.to_string() }),
            Backend::Directory(dir) => {
                let raw = fs::read_to_string(dir.join(format!("{}.yml", checkpoint.id)))?;
                Ok(serde_yaml::from_str(&raw)?)
            }
        }
    }

    /// The snapshot of the latest checkpoint
    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        match self.latest() {
            Some(cp) => self.snapshot(&cp.id).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{decode_yaml, DEFAULT_COLLECTION};
    use tempfile::TempDir;

    fn snapshot(site_name: &str) -> Snapshot {
        let mut objects = BTreeMap::new();
        objects.insert(
            "system.site".to_string(),
            decode_yaml(&format!("name: {}", site_name)).unwrap(),
        );
        let mut snapshot = Snapshot::new();
        snapshot.insert(DEFAULT_COLLECTION.to_string(), objects);
        snapshot
    }

    #[test]
    fn test_ids_are_sequential_and_linked() {
        let mut log = CheckpointLog::in_memory();
        let first = log.append("first", snapshot("a")).unwrap();
        let second = log.append("second", snapshot("b")).unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
        assert_eq!(first.parent, None);
        assert_eq!(second.parent.as_deref(), Some("1"));
        assert_eq!(log.latest().map(|cp| cp.label.as_str()), Some("second"));
        assert_eq!(log.snapshot("1").unwrap(), snapshot("a"));
    }

    #[test]
    fn test_labels_are_unique() {
        let mut log = CheckpointLog::in_memory();
        log.append("Backup", snapshot("a")).unwrap();
        let err = log.append("Backup", snapshot("b")).unwrap_err();
        assert!(matches!(err, Error::CheckpointExists { .. }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_empty_and_unknown() {
        let mut log = CheckpointLog::in_memory();
        assert!(matches!(log.snapshot("1"), Err(Error::NoCheckpoints)));
        log.append("one", snapshot("a")).unwrap();
        assert!(matches!(log.snapshot("9"), Err(Error::UnknownCheckpoint { .. })));
    }

    #[test]
    fn test_directory_log_persists() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("checkpoints");
        {
            let mut log = CheckpointLog::open(&dir).unwrap();
            assert!(log.is_empty());
            log.append("first", snapshot("a")).unwrap();
            log.append("second", snapshot("b")).unwrap();
        }
        assert!(dir.join("index.json").is_file());
        assert!(dir.join("2.yml").is_file());

        let log = CheckpointLog::open(&dir).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.directory(), Some(dir.as_path()));
        assert_eq!(log.snapshot("2").unwrap(), snapshot("b"));
        assert_eq!(log.latest_snapshot().unwrap(), Some(snapshot("b")));
    }
}
