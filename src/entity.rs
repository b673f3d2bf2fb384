//! Config entity types
//!
//! A config entity type owns every config object whose name starts with its
//! prefix followed by a dot: `user_role` owns `user.role.editor`. Types are
//! declared by extensions (see [`crate::extension::Extension::config_entity_types`]).

use std::collections::BTreeMap;

use crate::extension::ExtensionCatalog;

/// A config entity type and the extension providing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntityType {
    pub id: String,
    /// Config name prefix, without the trailing dot
    pub prefix: String,
    pub provider: String,
}

impl ConfigEntityType {
    pub fn new(id: &str, prefix: &str, provider: &str) -> Self {
        Self {
            id: id.to_string(),
            prefix: prefix.to_string(),
            provider: provider.to_string(),
        }
    }

    /// Whether a config name belongs to this type
    pub fn owns(&self, config_name: &str) -> bool {
        config_name
            .strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1)
    }

    /// The entity id part of a config name: `editor` for `user.role.editor`
    pub fn entity_id<'a>(&self, config_name: &'a str) -> Option<&'a str> {
        if !self.owns(config_name) {
            return None;
        }
        config_name.get(self.prefix.len() + 1..)
    }
}

/// Lookup of config entity types by id and by config name
#[derive(Debug, Clone, Default)]
pub struct EntityTypeManager {
    types: BTreeMap<String, ConfigEntityType>,
}

impl EntityTypeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every type declared by the catalog's extensions
    pub fn from_catalog(catalog: &ExtensionCatalog) -> Self {
        let mut manager = Self::new();
        for extension in catalog.iter() {
            for (id, prefix) in &extension.config_entity_types {
                manager.register(ConfigEntityType::new(id, prefix, &extension.machine_name));
            }
        }
        manager
    }

    pub fn register(&mut self, entity_type: ConfigEntityType) {
        self.types.insert(entity_type.id.clone(), entity_type);
    }

    pub fn get(&self, id: &str) -> Option<&ConfigEntityType> {
        self.types.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntityType> {
        self.types.values()
    }

    /// The type owning a config name. The longest matching prefix wins, so
    /// `core.date_format.short` belongs to `core.date_format` and not `core`.
    pub fn entity_type_by_name(&self, config_name: &str) -> Option<&ConfigEntityType> {
        self.types
            .values()
            .filter(|t| t.owns(config_name))
            .max_by_key(|t| t.prefix.len())
    }

    /// Id of the type owning a config name
    pub fn entity_type_id_by_name(&self, config_name: &str) -> Option<&str> {
        self.entity_type_by_name(config_name).map(|t| t.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Extension;

    fn manager() -> EntityTypeManager {
        let catalog = ExtensionCatalog::new()
            .with(Extension::module("user").with_entity_type("user_role", "user.role"))
            .with(
                Extension::module("system")
                    .with_entity_type("date_format", "core.date_format")
                    .with_entity_type("menu", "system.menu"),
            );
        EntityTypeManager::from_catalog(&catalog)
    }

    #[test]
    fn test_entity_type_by_name() {
        let manager = manager();
        assert_eq!(manager.entity_type_id_by_name("user.role.editor"), Some("user_role"));
        assert_eq!(
            manager.entity_type_id_by_name("core.date_format.short"),
            Some("date_format")
        );
        assert_eq!(manager.entity_type_id_by_name("user.settings"), None);
        assert_eq!(manager.entity_type_id_by_name("user.role"), None);
        assert_eq!(manager.get("menu").map(|t| t.provider.as_str()), Some("system"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut manager = manager();
        manager.register(ConfigEntityType::new("broad", "user", "user"));
        assert_eq!(manager.entity_type_id_by_name("user.role.editor"), Some("user_role"));
        assert_eq!(manager.entity_type_id_by_name("user.other.thing"), Some("broad"));
    }

    #[test]
    fn test_entity_id() {
        let role = ConfigEntityType::new("user_role", "user.role", "user");
        assert_eq!(role.entity_id("user.role.content_editor"), Some("content_editor"));
        assert_eq!(role.entity_id("user.roles.x"), None);
    }
}
