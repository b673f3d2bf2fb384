//! # Configuration Storage
//!
//! Configuration objects are named, dotted YAML mappings (`system.site`,
//! `user.role.editor`) grouped into collections. Everything in this crate
//! reads and writes configuration through the [`ConfigStorage`] trait; the
//! recipe engine never touches raw files directly.
//!
//! ## Backends and views
//!
//! - [`MemoryStorage`]: shared, lock-protected in-memory storage. Cloning a
//!   handle shares the underlying data, so collaborators can each hold one.
//! - [`FileStorage`]: a directory of `<name>.yml` files, one sub-directory per
//!   non-default collection.
//! - [`NullStorage`], [`MergedStorage`] and [`OverrideStorage`]: read-only
//!   composed views used while installing recipe configuration.
//!
//! The [`import`] module compares two storages and applies the difference,
//! which is how rollback to a checkpoint is performed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

pub mod dependency;
pub mod file;
pub mod import;
pub mod memory;
pub mod overlay;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use overlay::{MergedStorage, NullStorage, OverrideStorage};

/// The name of the default collection.
pub const DEFAULT_COLLECTION: &str = "";

/// The data of a single configuration object.
pub type ConfigData = Mapping;

/// A shared handle to a storage, used to inject the active storage into
/// several collaborators at once.
pub type SharedStorage = Arc<dyn ConfigStorage>;

/// Every object of every collection: collection name -> object name -> data.
pub type Snapshot = BTreeMap<String, BTreeMap<String, ConfigData>>;

/// Read/write access to a set of named configuration objects.
///
/// All methods take `&self`; backends that mutate use interior mutability so
/// that decorators can hold plain handles to their delegates.
pub trait ConfigStorage: fmt::Debug {
    /// Whether an object with this name exists in the collection.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Read one object, `None` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<ConfigData>>;

    /// Read several objects; names that do not exist are left out.
    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, ConfigData>> {
        let mut data = BTreeMap::new();
        for name in names {
            if let Some(value) = self.read(name)? {
                data.insert(name.clone(), value);
            }
        }
        Ok(data)
    }

    /// Create or replace an object.
    fn write(&self, name: &str, data: &ConfigData) -> Result<()>;

    /// Delete an object. Returns whether it existed.
    fn delete(&self, name: &str) -> Result<bool>;

    /// Move an object to a new name.
    fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        let data = self.read(name)?.ok_or_else(|| Error::Config {
            name: name.to_string(),
            message: "cannot rename an object that does not exist".to_string(),
        })?;
        self.write(new_name, &data)?;
        self.delete(name)?;
        Ok(())
    }

    /// Sorted names of every object starting with `prefix`.
    fn list_all(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete every object starting with `prefix`.
    fn delete_all(&self, prefix: &str) -> Result<()> {
        for name in self.list_all(prefix)? {
            self.delete(&name)?;
        }
        Ok(())
    }

    /// Serialize an object to the storage's native format.
    fn encode(&self, data: &ConfigData) -> Result<String> {
        Ok(serde_yaml::to_string(data)?)
    }

    /// Parse an object from the storage's native format.
    fn decode(&self, raw: &str) -> Result<ConfigData> {
        decode_yaml(raw)
    }

    /// A handle to another collection of the same storage.
    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage>;

    /// Names of every non-default collection holding data, sorted.
    fn all_collection_names(&self) -> Result<Vec<String>>;

    /// The collection this handle reads from and writes to.
    fn collection_name(&self) -> &str;
}

impl<S: ConfigStorage + ?Sized> ConfigStorage for Arc<S> {
    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        (**self).read(name)
    }

    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, ConfigData>> {
        (**self).read_multiple(names)
    }

    fn write(&self, name: &str, data: &ConfigData) -> Result<()> {
        (**self).write(name, data)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        (**self).delete(name)
    }

    fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        (**self).rename(name, new_name)
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_all(prefix)
    }

    fn delete_all(&self, prefix: &str) -> Result<()> {
        (**self).delete_all(prefix)
    }

    fn encode(&self, data: &ConfigData) -> Result<String> {
        (**self).encode(data)
    }

    fn decode(&self, raw: &str) -> Result<ConfigData> {
        (**self).decode(raw)
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        (**self).create_collection(collection)
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        (**self).all_collection_names()
    }

    fn collection_name(&self) -> &str {
        (**self).collection_name()
    }
}

/// Decode a YAML document into config data. An empty document is an empty
/// mapping; anything other than a mapping is rejected.
pub fn decode_yaml(raw: &str) -> Result<ConfigData> {
    match serde_yaml::from_str::<Value>(raw)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(Error::Config {
            name: "(decode)".to_string(),
            message: format!("expected a mapping, found {}", value_kind(&other)),
        }),
    }
}

/// Human readable name of a YAML value's type.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Export every object of every collection of a storage.
///
/// The default collection is always present in the result, even when empty.
pub fn export_all(storage: &dyn ConfigStorage) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    let default = storage.create_collection(DEFAULT_COLLECTION);
    snapshot.insert(DEFAULT_COLLECTION.to_string(), export_collection(default.as_ref())?);
    for collection in storage.all_collection_names()? {
        let handle = storage.create_collection(&collection);
        let objects = export_collection(handle.as_ref())?;
        if !objects.is_empty() {
            snapshot.insert(collection, objects);
        }
    }
    Ok(snapshot)
}

fn export_collection(storage: &dyn ConfigStorage) -> Result<BTreeMap<String, ConfigData>> {
    let names = storage.list_all("")?;
    storage.read_multiple(&names)
}

/// Look up a nested key such as `dependencies.config` in config data.
pub fn get_path<'a>(data: &'a ConfigData, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = data.get(first)?;
    for part in parts {
        current = current.as_mapping()?.get(part)?;
    }
    Some(current)
}

/// Strings found in a sequence at `path`, empty when absent.
pub fn string_list(data: &ConfigData, path: &str) -> Vec<String> {
    get_path(data, path)
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_yaml_empty_document_is_empty_mapping() {
        assert!(decode_yaml("").unwrap().is_empty());
        assert!(decode_yaml("# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_decode_yaml_rejects_sequences() {
        let err = decode_yaml("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("expected a mapping, found sequence"));
    }

    #[test]
    fn test_get_path_and_string_list() {
        let data = decode_yaml(
            "dependencies:\n  config:\n    - node.type.page\n  module:\n    - node\nname: x\n",
        )
        .unwrap();
        assert_eq!(
            string_list(&data, "dependencies.config"),
            vec!["node.type.page".to_string()]
        );
        assert!(string_list(&data, "dependencies.theme").is_empty());
        assert_eq!(get_path(&data, "name").and_then(Value::as_str), Some("x"));
        assert!(get_path(&data, "name.deeper").is_none());
    }

    #[test]
    fn test_export_all_includes_collections() {
        let storage = MemoryStorage::new();
        storage.insert_yaml("system.site", "name: Site").unwrap();
        let french = storage.create_collection("language.fr");
        french
            .write("system.site", &decode_yaml("name: Le site").unwrap())
            .unwrap();

        let snapshot = export_all(&storage).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[DEFAULT_COLLECTION].contains_key("system.site"));
        assert!(snapshot["language.fr"].contains_key("system.site"));
    }
}
