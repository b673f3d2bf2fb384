//! Built-in config actions
//!
//! - `entity_create:create` creates a config entity and fails if it exists.
//! - `entity_create:ensure_exists` creates a config entity unless it exists.
//! - `simple_config_update` sets keys on an existing simple config object.

use serde_yaml::{Mapping, Value};
use uuid::Uuid;

use super::{ActionContext, ActionDefinition, ConfigActionManager, ConfigActionPlugin, Exists, ALL_ENTITY_TYPES};
use crate::error::{Error, Result};
use crate::storage::ConfigData;

/// Register the built-in actions
pub fn register_core_plugins(manager: &mut ConfigActionManager) -> Result<()> {
    manager.register(ActionDefinition::new(
        "entity_create:create",
        "Entity create",
        vec![ALL_ENTITY_TYPES.to_string()],
        Box::new(EntityCreate::new(Exists::ErrorIfExists)),
    ))?;
    manager.register(ActionDefinition::new(
        "entity_create:ensure_exists",
        "Entity create if it does not exist",
        vec![ALL_ENTITY_TYPES.to_string()],
        Box::new(EntityCreate::new(Exists::ReturnEarlyIfExists)),
    ))?;
    manager.register(ActionDefinition::new(
        "simple_config_update",
        "Simple configuration update",
        Vec::new(),
        Box::new(SimpleConfigUpdate),
    ))?;
    Ok(())
}

/// Creates a config entity from the action value
#[derive(Debug, Clone, Copy)]
pub struct EntityCreate {
    exists: Exists,
}

impl EntityCreate {
    pub fn new(exists: Exists) -> Self {
        Self { exists }
    }
}

impl ConfigActionPlugin for EntityCreate {
    fn apply(&self, config_name: &str, value: &Value, context: &ActionContext<'_>) -> Result<()> {
        let exists = context.load(config_name)?.is_some();
        if self.exists.return_early(config_name, exists)? {
            return Ok(());
        }

        let entity_type = context
            .entity_types
            .entity_type_by_name(config_name)
            .ok_or_else(|| {
                Error::action(format!(
                    "Cannot determine a config entity type from {}",
                    config_name
                ))
            })?;
        let values = match value {
            Value::Mapping(values) => values.clone(),
            Value::Null => Mapping::new(),
            _ => {
                return Err(Error::action(format!(
                    "The value provided to create {} must be a mapping",
                    config_name
                )))
            }
        };
        let id = entity_type.entity_id(config_name).unwrap_or_default();

        let mut entity = ConfigData::new();
        entity.insert(Value::from("uuid"), Value::from(Uuid::new_v4().to_string()));
        entity.insert(Value::from("langcode"), Value::from("en"));
        entity.insert(Value::from("status"), Value::from(true));
        entity.insert(Value::from("dependencies"), Value::Mapping(Mapping::new()));
        entity.insert(Value::from("id"), Value::from(id));
        for (key, value) in values {
            entity.insert(key, value);
        }
        context.save(config_name, &entity)
    }
}

/// Sets keys on an existing simple config object.
///
/// Dotted keys address nested values: `page.front` sets `front` inside
/// `page`.
#[derive(Debug, Clone, Copy)]
pub struct SimpleConfigUpdate;

fn set_nested(data: &mut Mapping, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            data.insert(Value::from(path), value);
        }
        Some((head, rest)) => {
            let child = data
                .entry(Value::from(head))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !child.is_mapping() {
                *child = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(child) = child {
                set_nested(child, rest, value);
            }
        }
    }
}

impl ConfigActionPlugin for SimpleConfigUpdate {
    fn apply(&self, config_name: &str, value: &Value, context: &ActionContext<'_>) -> Result<()> {
        let Some(mut data) = context.load(config_name)? else {
            return Err(Error::action(format!(
                "Config {} does not exist so can not be updated",
                config_name
            )));
        };
        let Value::Mapping(values) = value else {
            return Err(Error::action(format!(
                "Config {} can not be updated because the value is not a mapping",
                config_name
            )));
        };
        for (key, value) in values {
            let key = key.as_str().ok_or_else(|| {
                Error::action(format!("Config {} can only be updated with string keys", config_name))
            })?;
            set_nested(&mut data, key, value.clone());
        }
        context.save(config_name, &data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entity::{ConfigEntityType, EntityTypeManager};
    use crate::storage::{ConfigStorage, MemoryStorage};

    fn manager() -> (ConfigActionManager, MemoryStorage) {
        let storage = MemoryStorage::new();
        let mut types = EntityTypeManager::new();
        types.register(ConfigEntityType::new("config_test", "config_test.dynamic", "config_test"));
        let mut manager = ConfigActionManager::new(Arc::new(storage.clone()), Arc::new(types));
        register_core_plugins(&mut manager).unwrap();
        (manager, storage)
    }

    fn yaml(raw: &str) -> Value {
        serde_yaml::from_str(raw).unwrap()
    }

    #[test]
    fn test_entity_create_and_ensure_exists() {
        let (manager, storage) = manager();
        let name = "config_test.dynamic.action_test";
        manager
            .apply_action("entity_create:ensure_exists", name, &yaml("{label: 'Action test'}"))
            .unwrap();

        let created = storage.read(name).unwrap().unwrap();
        assert_eq!(created.get("id").and_then(Value::as_str), Some("action_test"));
        assert_eq!(created.get("label").and_then(Value::as_str), Some("Action test"));
        assert_eq!(created.get("status").and_then(Value::as_bool), Some(true));
        assert!(created.get("uuid").and_then(Value::as_str).is_some());

        // A second ensure_exists leaves the entity alone
        manager
            .apply_action("ensure_exists", name, &yaml("{label: 'Changed'}"))
            .unwrap();
        assert_eq!(storage.read(name).unwrap().unwrap(), created);

        let err = manager
            .apply_action("entity_create:create", name, &yaml("{label: 'Action test'}"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Entity config_test.dynamic.action_test exists");
    }

    #[test]
    fn test_entity_create_requires_entity_type() {
        let (manager, _) = manager();
        let err = manager
            .apply_action("entity_create:create", "system.site", &yaml("{name: x}"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot determine a config entity type from system.site");
    }

    #[test]
    fn test_simple_config_update() {
        let (manager, storage) = manager();
        storage
            .insert_yaml("config_test.system", "foo: bar\n404: herp\npage:\n  front: /node\n")
            .unwrap();

        manager
            .apply_action("simple_config_update", "config_test.system", &yaml("{foo: 'Yay!', page.front: /home}"))
            .unwrap();
        let data = storage.read("config_test.system").unwrap().unwrap();
        assert_eq!(data.get("foo").and_then(Value::as_str), Some("Yay!"));
        assert_eq!(data.get("page"), Some(&yaml("{front: /home}")));

        let err = manager
            .apply_action("simple_config_update", "config_test.system", &yaml("Test"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config config_test.system can not be updated because the value is not a mapping"
        );

        storage.delete("config_test.system").unwrap();
        let err = manager
            .apply_action("simple_config_update", "config_test.system", &yaml("{foo: 'Yay!'}"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config config_test.system does not exist so can not be updated"
        );
    }
}
