//! Directory-backed configuration storage
//!
//! Each object lives in `<dir>/<name>.yml`. Non-default collections live in
//! sub-directories where dots become path separators, so the `language.fr`
//! collection is stored under `<dir>/language/fr/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{ConfigData, ConfigStorage, DEFAULT_COLLECTION};
use crate::error::{Error, Result};

const EXTENSION: &str = "yml";

/// Configuration storage over a directory of YAML files
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
    collection: String,
}

impl FileStorage {
    /// Storage for the default collection of `directory`
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_collection(directory, DEFAULT_COLLECTION)
    }

    /// Storage for a named collection of `directory`
    pub fn with_collection(directory: impl Into<PathBuf>, collection: &str) -> Self {
        Self {
            directory: directory.into(),
            collection: collection.to_string(),
        }
    }

    /// The root directory of this storage
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn collection_path(&self) -> PathBuf {
        if self.collection == DEFAULT_COLLECTION {
            self.directory.clone()
        } else {
            self.directory.join(self.collection.replace('.', "/"))
        }
    }

    /// The path an object is stored at
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.collection_path()
            .join(format!("{}.{}", name, EXTENSION))
    }
}

fn object_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

impl ConfigStorage for FileStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.file_path(name).is_file())
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        let path = self.file_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        self.decode(&raw)
            .map(Some)
            .map_err(|e| Error::Config {
                name: path.display().to_string(),
                message: e.to_string(),
            })
    }

    fn write(&self, name: &str, data: &ConfigData) -> Result<()> {
        let path = self.file_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = self.encode(data)?;
        fs::write(&path, encoded)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.collection_path();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = object_name(&path) {
                if name.starts_with(prefix) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self::with_collection(self.directory.clone(), collection))
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }

        let mut collections = Vec::new();
        for entry in WalkDir::new(&self.directory).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Config {
                name: self.directory.display().to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let has_objects = fs::read_dir(entry.path())?
                .filter_map(|e| e.ok())
                .any(|e| e.path().is_file() && object_name(&e.path()).is_some());
            if !has_objects {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.directory) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(".");
                collections.push(name);
            }
        }
        Ok(collections)
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
