//! Entity method actions
//!
//! Config entity types expose some of their setters as actions. Each exposed
//! method is declared in a [`MethodTable`] with an ordered parameter list, an
//! exists policy and the function that performs the change. A table turns
//! into one action per method and entity type, with the id
//! `<base>:<entity type prefix>:<method>`:
//!
//! ```text
//! entity_method:user.role:grantPermission
//! ```
//!
//! ## Arguments
//!
//! The value given in the recipe is mapped onto the declared parameters:
//!
//! - A scalar, or any value for a one-parameter method, is the sole argument.
//!   The method must then have exactly one parameter or exactly one required
//!   parameter.
//! - A sequence is unpacked positionally.
//! - A mapping is unpacked by parameter name.
//!
//! Missing optional arguments are passed as null. The entity is saved right
//! after the method runs.

use serde_yaml::{Mapping, Value};

use super::{ActionContext, ActionDefinition, ConfigActionPlugin, Exists};
use crate::entity::{ConfigEntityType, EntityTypeManager};
use crate::error::{Error, Result};
use crate::storage::{value_kind, ConfigData};

/// Base id of the core method actions
pub const ENTITY_METHOD: &str = "entity_method";

/// Signature of a method implementation: the entity and one value per
/// declared parameter
pub type MethodFn = fn(&mut ConfigData, &[Value]) -> Result<()>;

/// Accepted type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Bool,
    Integer,
    Mapping,
    Sequence,
    Any,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Bool => value.is_bool(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Mapping => value.is_mapping(),
            ParamKind::Sequence => value.is_sequence(),
            ParamKind::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Bool => "boolean",
            ParamKind::Integer => "integer",
            ParamKind::Mapping => "mapping",
            ParamKind::Sequence => "sequence",
            ParamKind::Any => "any",
        }
    }
}

/// One declared parameter of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// A method exposed as a config action
#[derive(Debug, Clone)]
pub struct ActionMethod {
    pub name: String,
    /// Defaults to `<entity type> <method>` when empty
    pub admin_label: String,
    pub params: Vec<ParamSpec>,
    pub exists: Exists,
    pub call: MethodFn,
}

impl ActionMethod {
    pub fn new(name: &str, params: Vec<ParamSpec>, call: MethodFn) -> Self {
        Self {
            name: name.to_string(),
            admin_label: String::new(),
            params,
            exists: Exists::ErrorIfNotExists,
            call,
        }
    }

    pub fn admin_label(mut self, label: &str) -> Self {
        self.admin_label = label.to_string();
        self
    }

    pub fn exists(mut self, exists: Exists) -> Self {
        self.exists = exists;
        self
    }

    fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.required).count()
    }
}

/// Methods exposed by one entity type, or by every entity type
#[derive(Debug, Clone)]
pub struct MethodTable {
    pub base_id: String,
    /// `None` exposes the methods on every registered entity type
    pub entity_type: Option<String>,
    pub methods: Vec<ActionMethod>,
}

impl MethodTable {
    pub fn new(base_id: &str, entity_type: Option<&str>, methods: Vec<ActionMethod>) -> Self {
        Self {
            base_id: base_id.to_string(),
            entity_type: entity_type.map(str::to_string),
            methods,
        }
    }

    /// One action definition per method and entity type
    pub fn definitions(&self, entity_types: &EntityTypeManager) -> Vec<ActionDefinition> {
        let targets: Vec<&ConfigEntityType> = match &self.entity_type {
            Some(id) => entity_types.get(id).into_iter().collect(),
            None => entity_types.iter().collect(),
        };

        let mut definitions = Vec::new();
        for entity_type in targets {
            for method in &self.methods {
                let id = format!("{}:{}:{}", self.base_id, entity_type.prefix, method.name);
                let admin_label = if method.admin_label.is_empty() {
                    format!("{} {}", entity_type.id, method.name)
                } else {
                    method.admin_label.clone()
                };
                let plugin = EntityMethod {
                    plugin_id: id.clone(),
                    entity_type: entity_type.id.clone(),
                    method: method.clone(),
                };
                definitions.push(ActionDefinition::new(
                    id,
                    admin_label,
                    vec![entity_type.id.clone()],
                    Box::new(plugin),
                ));
            }
        }
        definitions
    }
}

/// Runs one declared method against a config entity
#[derive(Debug)]
pub struct EntityMethod {
    plugin_id: String,
    entity_type: String,
    method: ActionMethod,
}

impl EntityMethod {
    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::EntityMethod {
            message: format!("Entity method config action '{}' {}", self.plugin_id, message),
        }
    }

    /// Map the recipe value onto the declared parameters
    pub fn arguments(&self, value: &Value) -> Result<Vec<Value>> {
        let params = &self.method.params;
        let structured = value.is_sequence() || value.is_mapping();

        let mut arguments: Vec<Option<Value>> = vec![None; params.len()];
        if !structured || params.len() == 1 {
            if params.len() != 1 && self.method.required_count() != 1 {
                return Err(self.error(format!(
                    "requires an array value. The number of parameters or required parameters for {}::{}() is not 1",
                    self.entity_type, self.method.name
                )));
            }
            // With one required parameter among several, it comes first
            let slot = params.iter().position(|p| p.required).unwrap_or(0);
            if let Some(argument) = arguments.get_mut(slot) {
                *argument = Some(value.clone());
            }
        } else if let Value::Sequence(items) = value {
            if items.len() > params.len() {
                return Err(self.error(format!(
                    "expects at most {} arguments, {} given",
                    params.len(),
                    items.len()
                )));
            }
            for (slot, item) in arguments.iter_mut().zip(items) {
                *slot = Some(item.clone());
            }
        } else if let Value::Mapping(named) = value {
            self.unpack_named(named, &mut arguments)?;
        }

        let mut resolved = Vec::with_capacity(params.len());
        for (param, argument) in params.iter().zip(arguments) {
            match argument {
                Some(argument) => {
                    if !param.kind.accepts(&argument) {
                        return Err(self.error(format!(
                            "expects argument '{}' to be {}, {} given",
                            param.name,
                            param.kind.name(),
                            value_kind(&argument)
                        )));
                    }
                    resolved.push(argument);
                }
                None if param.required => {
                    return Err(self.error(format!(
                        "is missing the required argument '{}'",
                        param.name
                    )));
                }
                None => resolved.push(Value::Null),
            }
        }
        Ok(resolved)
    }

    fn unpack_named(&self, named: &Mapping, arguments: &mut [Option<Value>]) -> Result<()> {
        for (key, item) in named {
            let key = key.as_str().unwrap_or_default();
            let slot = self
                .method
                .params
                .iter()
                .position(|p| p.name == key)
                .ok_or_else(|| self.error(format!("has no parameter named '{}'", key)))?;
            arguments[slot] = Some(item.clone());
        }
        Ok(())
    }
}

impl ConfigActionPlugin for EntityMethod {
    fn apply(&self, config_name: &str, value: &Value, context: &ActionContext<'_>) -> Result<()> {
        let entity = context.load(config_name)?;
        if self.method.exists.return_early(config_name, entity.is_some())? {
            return Ok(());
        }
        let mut entity = entity.unwrap_or_default();

        let arguments = self.arguments(value)?;
        (self.method.call)(&mut entity, &arguments)?;
        context.save(config_name, &entity)
    }
}

fn key(name: &str) -> Value {
    Value::from(name)
}

fn set_label(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    entity.insert(key("label"), args[0].clone());
    Ok(())
}

fn set_status(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    entity.insert(key("status"), args[0].clone());
    Ok(())
}

fn set_property(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    let property = args[0].as_str().unwrap_or_default();
    entity.insert(key(property), args[1].clone());
    Ok(())
}

fn set_third_party_setting(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    let module = args[0].as_str().unwrap_or_default();
    let setting = args[1].as_str().unwrap_or_default();

    let settings = entity
        .entry(key("third_party_settings"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !settings.is_mapping() {
        *settings = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(settings) = settings {
        let module_settings = settings
            .entry(key(module))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !module_settings.is_mapping() {
            *module_settings = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(module_settings) = module_settings {
            module_settings.insert(key(setting), args[2].clone());
        }
    }
    Ok(())
}

fn permissions(entity: &ConfigData) -> Vec<String> {
    entity
        .get("permissions")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn store_permissions(entity: &mut ConfigData, mut permissions: Vec<String>) {
    permissions.sort();
    permissions.dedup();
    entity.insert(
        key("permissions"),
        Value::Sequence(permissions.into_iter().map(Value::from).collect()),
    );
}

fn grant_permission(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    let mut current = permissions(entity);
    current.push(args[0].as_str().unwrap_or_default().to_string());
    store_permissions(entity, current);
    Ok(())
}

fn revoke_permission(entity: &mut ConfigData, args: &[Value]) -> Result<()> {
    let permission = args[0].as_str().unwrap_or_default();
    let current = permissions(entity)
        .into_iter()
        .filter(|p| p != permission)
        .collect();
    store_permissions(entity, current);
    Ok(())
}

/// Methods every config entity type exposes, plus the role permission methods
pub fn core_method_tables() -> Vec<MethodTable> {
    vec![
        MethodTable::new(
            ENTITY_METHOD,
            None,
            vec![
                ActionMethod::new(
                    "setLabel",
                    vec![ParamSpec::required("label", ParamKind::String)],
                    set_label,
                )
                .admin_label("Set label"),
                ActionMethod::new(
                    "setStatus",
                    vec![ParamSpec::required("status", ParamKind::Bool)],
                    set_status,
                )
                .admin_label("Set status"),
                ActionMethod::new(
                    "set",
                    vec![
                        ParamSpec::required("property_name", ParamKind::String),
                        ParamSpec::required("value", ParamKind::Any),
                    ],
                    set_property,
                )
                .admin_label("Set a value"),
                ActionMethod::new(
                    "setThirdPartySetting",
                    vec![
                        ParamSpec::required("module", ParamKind::String),
                        ParamSpec::required("key", ParamKind::String),
                        ParamSpec::required("value", ParamKind::Any),
                    ],
                    set_third_party_setting,
                )
                .admin_label("Set third-party setting"),
            ],
        ),
        MethodTable::new(
            ENTITY_METHOD,
            Some("user_role"),
            vec![
                ActionMethod::new(
                    "grantPermission",
                    vec![ParamSpec::required("permission", ParamKind::String)],
                    grant_permission,
                )
                .admin_label("Add permission to role"),
                ActionMethod::new(
                    "revokePermission",
                    vec![ParamSpec::required("permission", ParamKind::String)],
                    revoke_permission,
                )
                .admin_label("Remove permission from role"),
            ],
        ),
    ]
}
