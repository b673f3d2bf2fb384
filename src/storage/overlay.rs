//! Read-only composed storage views
//!
//! These views combine two storages behind the [`ConfigStorage`] trait. They
//! are used while applying a recipe:
//!
//! - [`MergedStorage`] joins a recipe's own config directory with the config
//!   it imports from extensions, the first storage winning on conflicts.
//! - [`OverrideStorage`] stands in for an extension's default config during
//!   install, substituting the recipe's copy of any object both provide.
//!
//! Writes through either view fail with [`Error::ReadOnlyStorage`].

use std::collections::{BTreeMap, BTreeSet};

use super::{ConfigData, ConfigStorage, DEFAULT_COLLECTION};
use crate::error::{Error, Result};

fn read_only(operation: &str) -> Error {
    Error::ReadOnlyStorage {
        operation: operation.to_string(),
    }
}

/// A storage that contains nothing
#[derive(Debug, Clone)]
pub struct NullStorage {
    collection: String,
}

impl NullStorage {
    pub fn new() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl Default for NullStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStorage for NullStorage {
    fn exists(&self, _name: &str) -> Result<bool> {
        Ok(false)
    }

    fn read(&self, _name: &str) -> Result<Option<ConfigData>> {
        Ok(None)
    }

    fn write(&self, _name: &str, _data: &ConfigData) -> Result<()> {
        Err(read_only("write"))
    }

    fn delete(&self, _name: &str) -> Result<bool> {
        Err(read_only("delete"))
    }

    fn list_all(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

/// Union of two storages; `first` takes precedence when both hold an object
#[derive(Debug)]
pub struct MergedStorage {
    first: Box<dyn ConfigStorage>,
    second: Box<dyn ConfigStorage>,
    collection: String,
}

impl MergedStorage {
    pub fn new(first: Box<dyn ConfigStorage>, second: Box<dyn ConfigStorage>) -> Self {
        let collection = first.collection_name().to_string();
        Self {
            first,
            second,
            collection,
        }
    }

    /// Fold a list of storages into a single view.
    ///
    /// Storages earlier in the list take precedence. An empty list gives a
    /// [`NullStorage`] and a single storage is returned unwrapped.
    pub fn from_storages(storages: Vec<Box<dyn ConfigStorage>>) -> Box<dyn ConfigStorage> {
        let mut iter = storages.into_iter();
        let Some(first) = iter.next() else {
            return Box::new(NullStorage::new());
        };
        iter.fold(first, |merged, next| {
            Box::new(MergedStorage::new(merged, next)) as Box<dyn ConfigStorage>
        })
    }
}

impl ConfigStorage for MergedStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.first.exists(name)? || self.second.exists(name)?)
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        match self.first.read(name)? {
            Some(data) => Ok(Some(data)),
            None => self.second.read(name),
        }
    }

    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, ConfigData>> {
        let mut data = self.second.read_multiple(names)?;
        data.extend(self.first.read_multiple(names)?);
        Ok(data)
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
        let mut names: BTreeSet<String> = self.first.list_all(prefix)?.into_iter().collect();
        names.extend(self.second.list_all(prefix)?);
        Ok(names.into_iter().collect())
    }

    fn delete_all(&self, _prefix: &str) -> Result<()> {
        Err(read_only("delete_all"))
    }

    fn encode(&self, data: &ConfigData) -> Result<String> {
        self.first.encode(data)
    }

    fn decode(&self, raw: &str) -> Result<ConfigData> {
        self.first.decode(raw)
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            first: self.first.create_collection(collection),
            second: self.second.create_collection(collection),
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.first.all_collection_names()?.into_iter().collect();
        names.extend(self.second.all_collection_names()?);
        Ok(names.into_iter().collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

/// A view of `wrapped` where the recipe's copy replaces any object both have
///
/// The set of names always comes from the wrapped storage: the recipe cannot
/// add objects through this view, only substitute their content.
#[derive(Debug)]
pub struct OverrideStorage {
    recipe: Box<dyn ConfigStorage>,
    wrapped: Box<dyn ConfigStorage>,
    collection: String,
}

impl OverrideStorage {
    pub fn new(recipe: Box<dyn ConfigStorage>, wrapped: Box<dyn ConfigStorage>) -> Self {
        let collection = wrapped.collection_name().to_string();
        Self {
            recipe,
            wrapped,
            collection,
        }
    }
}

impl ConfigStorage for OverrideStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        self.wrapped.exists(name)
    }

    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        if self.wrapped.exists(name)? && self.recipe.exists(name)? {
            return self.recipe.read(name);
        }
        self.wrapped.read(name)
    }

    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, ConfigData>> {
        let mut data = self.wrapped.read_multiple(names)?;
        for (name, value) in data.iter_mut() {
            if let Some(replacement) = self.recipe.read(name)? {
                *value = replacement;
            }
        }
        Ok(data)
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
        self.wrapped.list_all(prefix)
    }

    fn delete_all(&self, _prefix: &str) -> Result<()> {
        Err(read_only("delete_all"))
    }

    fn encode(&self, data: &ConfigData) -> Result<String> {
        self.wrapped.encode(data)
    }

    fn decode(&self, raw: &str) -> Result<ConfigData> {
        self.wrapped.decode(raw)
    }

    fn create_collection(&self, collection: &str) -> Box<dyn ConfigStorage> {
        Box::new(Self {
            recipe: self.recipe.create_collection(collection),
            wrapped: self.wrapped.create_collection(collection),
            collection: collection.to_string(),
        })
    }

    fn all_collection_names(&self) -> Result<Vec<String>> {
        self.wrapped.all_collection_names()
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
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

    fn boxed(storage: MemoryStorage) -> Box<dyn ConfigStorage> {
        Box::new(storage)
    }

    fn label(data: Option<ConfigData>) -> Option<String> {
        data.and_then(|d| d.get("label").and_then(|v| v.as_str()).map(str::to_string))
    }

    #[test]
    fn test_merged_storage_first_wins() {
        let a = storage(&[("x.one", "label: A"), ("x.two", "label: A2")]);
        let b = storage(&[("x.one", "label: B"), ("x.three", "label: B3")]);
        let merged = MergedStorage::new(Box::new(a), Box::new(b));

        assert_eq!(label(merged.read("x.one").unwrap()).as_deref(), Some("A"));
        assert_eq!(label(merged.read("x.three").unwrap()).as_deref(), Some("B3"));
        assert_eq!(merged.list_all("x.").unwrap(), vec!["x.one", "x.three", "x.two"]);

        let all = merged
            .read_multiple(&["x.one".to_string(), "x.three".to_string()])
            .unwrap();
        assert_eq!(label(all.get("x.one").cloned()).as_deref(), Some("A"));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_merged_storage_is_read_only() {
        let merged = MergedStorage::new(Box::new(MemoryStorage::new()), Box::new(NullStorage::new()));
        let err = merged.write("x", &ConfigData::new()).unwrap_err();
        assert!(matches!(err, Error::ReadOnlyStorage { .. }));
        assert!(merged.delete("x").is_err());
    }

    #[test]
    fn test_from_storages_edge_cases() {
        let empty = MergedStorage::from_storages(Vec::new());
        assert!(empty.list_all("").unwrap().is_empty());

        let single = MergedStorage::from_storages(vec![boxed(storage(&[("a.b", "label: one")]))]);
        // A single storage is not wrapped, so it stays writable
        single.write("a.c", &ConfigData::new()).unwrap();
        assert_eq!(single.list_all("a.").unwrap(), vec!["a.b", "a.c"]);

        let three = MergedStorage::from_storages(vec![
            boxed(storage(&[("a.b", "label: first")])),
            boxed(storage(&[("a.b", "label: second"), ("a.c", "label: second")])),
            boxed(storage(&[("a.c", "label: third"), ("a.d", "label: third")])),
        ]);
        assert_eq!(label(three.read("a.b").unwrap()).as_deref(), Some("first"));
        assert_eq!(label(three.read("a.c").unwrap()).as_deref(), Some("second"));
        assert_eq!(label(three.read("a.d").unwrap()).as_deref(), Some("third"));
    }

    #[test]
    fn test_override_storage_only_substitutes_existing_names() {
        let recipe = storage(&[("node.settings", "label: recipe"), ("node.extra", "label: recipe")]);
        let defaults = storage(&[("node.settings", "label: default"), ("node.type.page", "label: page")]);
        let view = OverrideStorage::new(Box::new(recipe), Box::new(defaults));

        assert_eq!(view.list_all("").unwrap(), vec!["node.settings", "node.type.page"]);
        assert!(!view.exists("node.extra").unwrap());
        assert_eq!(label(view.read("node.settings").unwrap()).as_deref(), Some("recipe"));
        assert_eq!(label(view.read("node.type.page").unwrap()).as_deref(), Some("page"));
        assert!(view.read("node.extra").unwrap().is_none());

        let all = view.read_multiple(&view.list_all("").unwrap()).unwrap();
        assert_eq!(label(all.get("node.settings").cloned()).as_deref(), Some("recipe"));
    }

    #[test]
    fn test_views_propagate_collections() {
        let a = MemoryStorage::new();
        a.create_collection("language.fr")
            .write("system.site", &crate::storage::decode_yaml("label: fr").unwrap())
            .unwrap();
        let merged = MergedStorage::new(Box::new(a), Box::new(NullStorage::new()));
        assert_eq!(merged.all_collection_names().unwrap(), vec!["language.fr"]);

        let french = merged.create_collection("language.fr");
        assert_eq!(french.collection_name(), "language.fr");
        assert_eq!(label(french.read("system.site").unwrap()).as_deref(), Some("fr"));
    }
}
