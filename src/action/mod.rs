//! # Config Actions
//!
//! A config action is a named operation that mutates configuration. Recipes
//! list actions under `config.actions`, keyed by a config name or a wildcard
//! expression:
//!
//! ```yaml
//! config:
//!   actions:
//!     user.role.*:
//!       grantPermission: 'access content'
//!     system.site:
//!       simple_config_update:
//!         name: 'My site'
//! ```
//!
//! ## Action ids
//!
//! Every action has a fully-qualified id such as
//! `entity_method:user.role:grantPermission`. Actions that apply to config
//! entity types can also be referred to by a shorthand: the part of the id
//! after the last `:`. Shorthands are scoped to an entity type, so
//! `grantPermission` used on `user.role.editor` resolves through the entity
//! type owning that name. Two actions claiming the same shorthand for the same
//! entity type are rejected when the second one is registered.
//!
//! ## Modules
//!
//! - [`expression`]: wildcard config name expressions
//! - [`method`]: actions derived from explicit entity method tables
//! - [`plugins`]: the built-in `entity_create` and `simple_config_update`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_yaml::Value;

use crate::entity::EntityTypeManager;
use crate::error::{Error, Result};
use crate::storage::{ConfigData, ConfigStorage, SharedStorage};

pub mod expression;
pub mod method;
pub mod plugins;

pub use method::{ActionMethod, MethodTable, ParamKind, ParamSpec};

/// Separates a base action id from its derivative parts
pub const DERIVATIVE_SEPARATOR: char = ':';

/// Entity type wildcard: the action applies to every entity type
pub const ALL_ENTITY_TYPES: &str = "*";

/// What an action does when its target does or does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exists {
    ErrorIfExists,
    ErrorIfNotExists,
    ReturnEarlyIfExists,
    ReturnEarlyIfNotExists,
}

impl Exists {
    /// Whether the action should stop without doing anything.
    ///
    /// Fails when the policy forbids the current state of the target.
    pub fn return_early(self, config_name: &str, exists: bool) -> Result<bool> {
        match (self, exists) {
            (Exists::ErrorIfExists, true) => {
                Err(Error::action(format!("Entity {} exists", config_name)))
            }
            (Exists::ErrorIfNotExists, false) => {
                Err(Error::action(format!("Entity {} does not exist", config_name)))
            }
            (Exists::ReturnEarlyIfExists, true) | (Exists::ReturnEarlyIfNotExists, false) => Ok(true),
            _ => Ok(false),
        }
    }
}

/// Collaborators available to an action while it runs
pub struct ActionContext<'a> {
    /// The id the action was registered under
    pub plugin_id: &'a str,
    pub storage: &'a dyn ConfigStorage,
    pub entity_types: &'a EntityTypeManager,
}

impl ActionContext<'_> {
    /// Read a config object from the active storage
    pub fn load(&self, config_name: &str) -> Result<Option<ConfigData>> {
        self.storage.read(config_name)
    }

    /// Write a config object to the active storage
    pub fn save(&self, config_name: &str, data: &ConfigData) -> Result<()> {
        self.storage.write(config_name, data)
    }
}

/// The implementation of a config action
pub trait ConfigActionPlugin: fmt::Debug {
    /// Apply the action to one concrete config object
    fn apply(&self, config_name: &str, value: &Value, context: &ActionContext<'_>) -> Result<()>;
}

/// A registered config action
#[derive(Debug)]
pub struct ActionDefinition {
    pub id: String,
    pub admin_label: String,
    /// Entity type ids the action applies to; [`ALL_ENTITY_TYPES`] for all
    pub entity_types: Vec<String>,
    plugin: Box<dyn ConfigActionPlugin>,
}

impl ActionDefinition {
    pub fn new(
        id: impl Into<String>,
        admin_label: impl Into<String>,
        entity_types: Vec<String>,
        plugin: Box<dyn ConfigActionPlugin>,
    ) -> Self {
        Self {
            id: id.into(),
            admin_label: admin_label.into(),
            entity_types,
            plugin,
        }
    }

    /// The id without its base and derivative prefixes
    pub fn shorthand(&self) -> &str {
        self.id
            .rsplit_once(DERIVATIVE_SEPARATOR)
            .map_or(self.id.as_str(), |(_, short)| short)
    }

    /// Whether the action's shorthand is usable for an entity type
    pub fn applies_to(&self, entity_type: &str) -> bool {
        self.entity_types
            .iter()
            .any(|t| t == entity_type || t == ALL_ENTITY_TYPES)
    }

    /// An entity type both definitions apply to, if any
    fn shared_entity_type(&self, other: &ActionDefinition) -> Option<String> {
        for mine in &self.entity_types {
            for theirs in &other.entity_types {
                if mine == theirs {
                    return Some(mine.clone());
                }
                if mine == ALL_ENTITY_TYPES {
                    return Some(theirs.clone());
                }
                if theirs == ALL_ENTITY_TYPES {
                    return Some(mine.clone());
                }
            }
        }
        None
    }
}

/// Registry of config actions and the entry point for applying them
pub struct ConfigActionManager {
    definitions: BTreeMap<String, ActionDefinition>,
    /// Registration order, used to report shorthand collisions consistently
    order: Vec<String>,
    storage: SharedStorage,
    entity_types: Arc<EntityTypeManager>,
}

impl fmt::Debug for ConfigActionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigActionManager")
            .field("definitions", &self.order)
            .finish()
    }
}

impl ConfigActionManager {
    /// An empty registry
    pub fn new(storage: SharedStorage, entity_types: Arc<EntityTypeManager>) -> Self {
        Self {
            definitions: BTreeMap::new(),
            order: Vec::new(),
            storage,
            entity_types,
        }
    }

    /// A registry holding the built-in actions and the core method tables
    pub fn with_core_actions(storage: SharedStorage, entity_types: Arc<EntityTypeManager>) -> Result<Self> {
        let mut manager = Self::new(storage, entity_types);
        plugins::register_core_plugins(&mut manager)?;
        for table in method::core_method_tables() {
            manager.register_methods(&table)?;
        }
        Ok(manager)
    }

    pub fn entity_types(&self) -> &EntityTypeManager {
        &self.entity_types
    }

    /// Register an action.
    ///
    /// Fails if the id is taken or if the action's shorthand is already
    /// claimed for an entity type it applies to.
    pub fn register(&mut self, definition: ActionDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.id) {
            return Err(Error::action(format!(
                "A config action with the id '{}' is already registered",
                definition.id
            )));
        }
        for existing_id in &self.order {
            let Some(existing) = self.definitions.get(existing_id) else {
                continue;
            };
            if existing.shorthand() != definition.shorthand() {
                continue;
            }
            if let Some(entity_type) = existing.shared_entity_type(&definition) {
                return Err(Error::DuplicateShorthand {
                    first: existing.id.clone(),
                    second: definition.id.clone(),
                    entity_type,
                });
            }
        }
        debug!("Registered config action {}", definition.id);
        self.order.push(definition.id.clone());
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Register one action per method of a method table
    pub fn register_methods(&mut self, table: &MethodTable) -> Result<()> {
        for definition in table.definitions(&self.entity_types) {
            self.register(definition)?;
        }
        Ok(())
    }

    pub fn has_definition(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Option<&ActionDefinition> {
        self.definitions.get(id)
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.order.iter().filter_map(|id| self.definitions.get(id))
    }

    /// Shorthand -> fully-qualified id for one entity type
    pub fn shorthand_action_ids(&self, entity_type: &str) -> BTreeMap<String, String> {
        self.definitions()
            .filter(|d| d.applies_to(entity_type))
            .map(|d| (d.shorthand().to_string(), d.id.clone()))
            .collect()
    }

    /// The fully-qualified id an action id refers to for a config name
    pub fn resolve_action_id(&self, action_id: &str, config_name: &str) -> Result<String> {
        if self.has_definition(action_id) {
            return Ok(action_id.to_string());
        }
        self.entity_types
            .entity_type_id_by_name(config_name)
            .and_then(|entity_type| self.shorthand_action_ids(entity_type).remove(action_id))
            .ok_or_else(|| Error::ActionNotFound {
                action_id: action_id.to_string(),
            })
    }

    /// Concrete config names an expression refers to
    pub fn config_names_matching_expression(&self, expression: &str) -> Result<Vec<String>> {
        expression::matching_names(expression, &self.entity_types, self.storage.as_ref())
    }

    /// Apply an action to every config object an expression refers to
    pub fn apply_action(&self, action_id: &str, config_name: &str, data: &Value) -> Result<()> {
        let id = self.resolve_action_id(action_id, config_name)?;
        let definition = self.definitions.get(&id).ok_or_else(|| Error::ActionNotFound {
            action_id: action_id.to_string(),
        })?;
        let context = ActionContext {
            plugin_id: &definition.id,
            storage: self.storage.as_ref(),
            entity_types: &self.entity_types,
        };
        for name in self.config_names_matching_expression(config_name)? {
            debug!("Applying config action {} to {}", definition.id, name);
            definition.plugin.apply(&name, data, &context)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ConfigEntityType;
    use crate::storage::MemoryStorage;

    #[derive(Debug)]
    struct Touch;

    impl ConfigActionPlugin for Touch {
        fn apply(&self, config_name: &str, _value: &Value, context: &ActionContext<'_>) -> Result<()> {
            let mut data = context.load(config_name)?.unwrap_or_default();
            data.insert(Value::from("touched"), Value::from(true));
            context.save(config_name, &data)
        }
    }

    fn manager() -> (ConfigActionManager, MemoryStorage) {
        let storage = MemoryStorage::new();
        let mut types = EntityTypeManager::new();
        types.register(ConfigEntityType::new("user_role", "user.role", "user"));
        types.register(ConfigEntityType::new("node_type", "node.type", "node"));
        let manager = ConfigActionManager::new(Arc::new(storage.clone()), Arc::new(types));
        (manager, storage)
    }

    fn definition(id: &str, types: &[&str]) -> ActionDefinition {
        ActionDefinition::new(
            id,
            id,
            types.iter().map(|t| t.to_string()).collect(),
            Box::new(Touch),
        )
    }

    #[test]
    fn test_exists_policies() {
        assert!(Exists::ReturnEarlyIfExists.return_early("a.b", true).unwrap());
        assert!(!Exists::ReturnEarlyIfExists.return_early("a.b", false).unwrap());
        assert!(Exists::ReturnEarlyIfNotExists.return_early("a.b", false).unwrap());
        assert!(!Exists::ErrorIfExists.return_early("a.b", false).unwrap());
        assert_eq!(
            Exists::ErrorIfExists.return_early("a.b", true).unwrap_err().to_string(),
            "Entity a.b exists"
        );
        assert_eq!(
            Exists::ErrorIfNotExists.return_early("a.b", false).unwrap_err().to_string(),
            "Entity a.b does not exist"
        );
    }

    #[test]
    fn test_shorthand_resolution_is_scoped_to_entity_type() {
        let (mut manager, _) = manager();
        manager.register(definition("touch:user.role:poke", &["user_role"])).unwrap();

        assert_eq!(
            manager.resolve_action_id("poke", "user.role.editor").unwrap(),
            "touch:user.role:poke"
        );
        assert_eq!(
            manager.resolve_action_id("touch:user.role:poke", "anything").unwrap(),
            "touch:user.role:poke"
        );
        let err = manager.resolve_action_id("poke", "node.type.page").unwrap_err();
        assert_eq!(err.to_string(), "The \"poke\" plugin does not exist.");
    }

    #[test]
    fn test_wildcard_entity_type_shorthand() {
        let (mut manager, _) = manager();
        manager.register(definition("touch:everything", &["*"])).unwrap();
        assert_eq!(
            manager.resolve_action_id("everything", "node.type.page").unwrap(),
            "touch:everything"
        );
        // Shorthands never resolve for simple config
        assert!(manager.resolve_action_id("everything", "system.site").is_err());
    }

    #[test]
    fn test_duplicate_shorthand_is_rejected_on_register() {
        let (mut manager, _) = manager();
        manager.register(definition("first:user.role:poke", &["user_role"])).unwrap();
        manager.register(definition("first:node.type:poke", &["node_type"])).unwrap();

        let err = manager
            .register(definition("second:user.role:poke", &["user_role"]))
            .unwrap_err();
        match err {
            Error::DuplicateShorthand {
                first,
                second,
                entity_type,
            } => {
                assert_eq!(first, "first:user.role:poke");
                assert_eq!(second, "second:user.role:poke");
                assert_eq!(entity_type, "user_role");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!manager.has_definition("second:user.role:poke"));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let (mut manager, _) = manager();
        manager.register(definition("simple", &[])).unwrap();
        assert!(manager.register(definition("simple", &[])).is_err());
    }

    #[test]
    fn test_apply_action_over_wildcard() {
        let (mut manager, storage) = manager();
        manager.register(definition("touch:user.role:poke", &["user_role"])).unwrap();
        storage.insert_yaml("user.role.anonymous", "id: anonymous").unwrap();
        storage.insert_yaml("user.role.authenticated", "id: authenticated").unwrap();
        storage.insert_yaml("user.settings", "anonymous: Guest").unwrap();

        manager
            .apply_action("poke", "user.role.*", &Value::Null)
            .unwrap();

        for name in ["user.role.anonymous", "user.role.authenticated"] {
            let data = storage.read(name).unwrap().unwrap();
            assert_eq!(data.get("touched").and_then(Value::as_bool), Some(true));
        }
        assert!(storage.read("user.settings").unwrap().unwrap().get("touched").is_none());
    }

    #[test]
    fn test_core_registry_has_builtin_actions() {
        let storage = MemoryStorage::new();
        let mut types = EntityTypeManager::new();
        types.register(ConfigEntityType::new("user_role", "user.role", "user"));
        let manager =
            ConfigActionManager::with_core_actions(Arc::new(storage), Arc::new(types)).unwrap();

        for id in [
            "entity_create:create",
            "entity_create:ensure_exists",
            "simple_config_update",
            "entity_method:user.role:setLabel",
            "entity_method:user.role:grantPermission",
        ] {
            assert!(manager.has_definition(id), "{} should be registered", id);
        }
        let shorthands = manager.shorthand_action_ids("user_role");
        assert_eq!(
            shorthands.get("revokePermission").map(String::as_str),
            Some("entity_method:user.role:revokePermission")
        );
        assert_eq!(
            shorthands.get("ensure_exists").map(String::as_str),
            Some("entity_create:ensure_exists")
        );
        assert!(!shorthands.contains_key("simple_config_update"));
    }
}
