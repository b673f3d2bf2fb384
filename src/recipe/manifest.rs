//! # Recipe Manifests
//!
//! Every recipe is a directory holding a `recipe.yml` manifest:
//!
//! ```yaml
//! name: Editorial workflow
//! description: Adds an editor role and the content moderation module.
//! type: Content type
//! recipes:
//!   - article_content_type
//! install:
//!   - content_moderation
//! config:
//!   import:
//!     node: '*'
//!     system:
//!       - system.menu.main
//!   actions:
//!     user.role.editor:
//!       grantPermission: 'use editorial transition publish'
//! content: []
//! ```
//!
//! The manifest is validated before it is deserialized. Validation collects
//! every violation instead of stopping at the first one, and reports them
//! with bracketed property paths such as `[recipes][0]`. Checks that need to
//! know about other recipes, extensions or config actions go through a
//! [`ManifestContext`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result, Violation};
use crate::extension::dependency_name;

/// File name of a recipe manifest
pub const MANIFEST_FILE: &str = "recipe.yml";

const TOP_LEVEL_KEYS: [&str; 7] = [
    "name",
    "description",
    "type",
    "recipes",
    "install",
    "config",
    "content",
];
const CONFIG_KEYS: [&str; 2] = ["import", "actions"];

const MISSING: &str = "This field is missing.";
const UNEXPECTED: &str = "This field was not expected.";
const NOT_BLANK: &str = "This value should not be blank.";
const TYPE_STRING: &str = "This value should be of type string.";
const TYPE_ARRAY: &str = "This value should be of type array.";
const IMPORT_SPEC: &str = "This value should satisfy at least one of the following constraints: [1] This value should be identical to string \"*\". [2] Each element of this collection should satisfy its own set of constraints.";

/// A decoded and validated manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-text classification
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Recipes to apply first, by directory name
    #[serde(default)]
    pub recipes: Vec<String>,
    /// Modules and themes to install
    #[serde(default)]
    pub install: Vec<String>,
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default)]
    pub content: Value,
}

/// The `config` key of a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Extension name -> which of its default config to import
    #[serde(default)]
    pub import: BTreeMap<String, ImportSpec>,
    /// Config name expression -> action id -> action value, in manifest order
    #[serde(default)]
    pub actions: Mapping,
}

/// Which default config of an extension a recipe imports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportSpec {
    /// `'*'`: everything the extension ships
    All(String),
    /// Only the listed config names
    Names(Vec<String>),
}

/// What manifest validation needs to know beyond the manifest itself
pub trait ManifestContext {
    /// Whether a recipe with this directory name can be found
    fn recipe_exists(&self, name: &str) -> bool;

    /// Whether a module or theme is available, installed or not
    fn extension_exists(&self, name: &str) -> bool;

    /// Extensions that are installed, installed by `install` or installed by
    /// any of `recipes` and the recipes they depend on
    fn available_extensions(&self, install: &[String], recipes: &[String]) -> BTreeSet<String>;

    /// Whether an action id resolves for a config name expression
    fn action_exists(&self, action_id: &str, config_name: &str) -> bool;
}

/// Read and decode a manifest without validating it
pub fn read(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(Error::ManifestMissing {
            path: path.to_path_buf(),
        });
    }
    let unreadable = |message: String| Error::ManifestUnreadable {
        path: path.to_path_buf(),
        message,
    };
    let raw = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    if raw.trim().is_empty() {
        return Err(unreadable("the file is empty".to_string()));
    }
    serde_yaml::from_str(&raw).map_err(|e| unreadable(e.to_string()))
}

/// Read, validate and deserialize the manifest at `path`.
///
/// `recipe_id` is the recipe's directory name, used to reject
/// self-dependencies.
pub fn parse(path: &Path, recipe_id: &str, context: &dyn ManifestContext) -> Result<Manifest> {
    let data = read(path)?;
    let violations = validate(&data, recipe_id, context)?;
    if !violations.is_empty() {
        return Err(Error::ManifestInvalid {
            path: path.to_path_buf(),
            violations,
        });
    }
    serde_yaml::from_value(without_nulls(data)).map_err(|e| Error::ManifestUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Drop optional keys whose value is `~` so they take their defaults
fn without_nulls(mut data: Value) -> Value {
    if let Value::Mapping(root) = &mut data {
        root.retain(|_, v| !v.is_null());
        if let Some(Value::Mapping(config)) = root.get_mut("config") {
            config.retain(|_, v| !v.is_null());
        }
    }
    data
}

/// Control character patterns for single-line labels and free text
struct Patterns {
    label: Regex,
    text: Regex,
    import_name: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            label: Regex::new(r"\p{C}")?,
            text: Regex::new(r"[\p{C}&&[^\t\n\r]]")?,
            import_name: Regex::new(r"^.+\.")?,
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Sequence(s) => s.is_empty(),
        Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}

fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

struct Collector {
    violations: Vec<Violation>,
}

impl Collector {
    fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    /// A required or optional string that must be one visible line
    fn label(&mut self, path: &str, value: &Value, pattern: &Regex, message: &str) {
        match value {
            Value::Null => self.add(path, NOT_BLANK),
            Value::String(s) if s.is_empty() => self.add(path, NOT_BLANK),
            Value::String(s) if pattern.is_match(s) => self.add(path, message),
            Value::String(_) => {}
            _ => self.add(path, TYPE_STRING),
        }
    }

    /// A list of non-blank strings; returns the strings that passed
    fn string_list(&mut self, path: &str, value: &Value) -> Vec<(usize, String)> {
        let Some(items) = value.as_sequence() else {
            if !value.is_null() {
                self.add(path, TYPE_ARRAY);
            }
            return Vec::new();
        };
        let mut valid = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            match item {
                Value::String(s) if !s.is_empty() => valid.push((i, s.clone())),
                Value::String(_) | Value::Null => self.add(item_path, NOT_BLANK),
                _ => self.add(item_path, TYPE_STRING),
            }
        }
        valid
    }
}

/// Every violation in a decoded manifest
pub fn validate(data: &Value, recipe_id: &str, context: &dyn ManifestContext) -> Result<Vec<Violation>> {
    let patterns = Patterns::new()?;
    let mut out = Collector {
        violations: Vec::new(),
    };

    let Some(root) = data.as_mapping() else {
        out.add("", TYPE_ARRAY);
        return Ok(out.violations);
    };

    for key in root.keys() {
        let label = key_label(key);
        if !TOP_LEVEL_KEYS.contains(&label.as_str()) {
            out.add(format!("[{}]", label), UNEXPECTED);
        }
    }

    match root.get("name") {
        None => out.add("[name]", MISSING),
        Some(name) => out.label(
            "[name]",
            name,
            &patterns.label,
            "Recipe names cannot span multiple lines or contain control characters.",
        ),
    }

    if let Some(description) = root.get("description") {
        match description {
            Value::String(s) if s.is_empty() => out.add("[description]", NOT_BLANK),
            Value::String(s) if patterns.text.is_match(s) => out.add(
                "[description]",
                "The recipe description cannot contain control characters, only visible characters.",
            ),
            Value::String(_) => {}
            other if is_blank(other) => out.add("[description]", NOT_BLANK),
            _ => out.add("[description]", TYPE_STRING),
        }
    }

    if let Some(kind) = root.get("type") {
        out.label(
            "[type]",
            kind,
            &patterns.label,
            "Recipe type cannot span multiple lines or contain control characters.",
        );
    }

    let mut recipes = Vec::new();
    if let Some(value) = root.get("recipes") {
        for (i, name) in out.string_list("[recipes]", value) {
            let path = format!("[recipes][{}]", i);
            // A self-dependency is reported instead of looked up
            if name == recipe_id {
                out.add(path, format!("The \"{}\" recipe cannot depend on itself.", name));
            } else if !context.recipe_exists(&name) {
                out.add(path, format!("The {} recipe does not exist.", name));
            }
            recipes.push(name);
        }
    }

    let mut install = Vec::new();
    if let Some(value) = root.get("install") {
        for (i, entry) in out.string_list("[install]", value) {
            let name = dependency_name(&entry).to_string();
            if !context.extension_exists(&name) {
                out.add(
                    format!("[install][{}]", i),
                    format!("\"{}\" is not a known module or theme.", name),
                );
            }
            install.push(name);
        }
    }

    if let Some(config) = root.get("config") {
        validate_config(config, &patterns, &install, &recipes, context, &mut out);
    }

    if let Some(content) = root.get("content") {
        if !(content.is_null() || content.is_sequence() || content.is_mapping()) {
            out.add("[content]", TYPE_ARRAY);
        }
    }

    Ok(out.violations)
}

fn validate_config(
    config: &Value,
    patterns: &Patterns,
    install: &[String],
    recipes: &[String],
    context: &dyn ManifestContext,
    out: &mut Collector,
) {
    if config.is_null() {
        return;
    }
    let Some(config) = config.as_mapping() else {
        out.add("[config]", TYPE_ARRAY);
        return;
    };
    for key in config.keys() {
        let label = key_label(key);
        if !CONFIG_KEYS.contains(&label.as_str()) {
            out.add(format!("[config][{}]", label), UNEXPECTED);
        }
    }

    match config.get("import") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(import)) => {
            for (extension, spec) in import {
                let label = key_label(extension);
                if !context.extension_exists(&label) {
                    out.add(
                        format!("[config][import][{}]", label),
                        format!("\"{}\" is not a known module or theme.", label),
                    );
                }
                let valid = match spec {
                    Value::String(s) => s == "*",
                    Value::Sequence(names) => names.iter().all(|name| {
                        name.as_str()
                            .is_some_and(|n| !n.is_empty() && patterns.import_name.is_match(n))
                    }),
                    _ => false,
                };
                if !valid {
                    out.add(format!("[config][import][{}]", label), IMPORT_SPEC);
                }
            }
        }
        Some(_) => out.add("[config][import]", TYPE_ARRAY),
    }

    let actions = match config.get("actions") {
        None | Some(Value::Null) => return,
        Some(Value::Mapping(actions)) => actions,
        Some(_) => {
            out.add("[config][actions]", TYPE_ARRAY);
            return;
        }
    };

    let mut available: Option<BTreeSet<String>> = None;
    for (config_name, invocations) in actions {
        let config_name = key_label(config_name);
        let path = format!("[config][actions][{}]", config_name);
        let Some(invocations) = invocations.as_mapping() else {
            let message = if invocations.is_null() { NOT_BLANK } else { TYPE_ARRAY };
            out.add(path, message);
            continue;
        };
        if invocations.is_empty() {
            out.add(path, NOT_BLANK);
            continue;
        }

        let provider = config_name.split('.').next().unwrap_or_default();
        if provider != "core" {
            let available =
                available.get_or_insert_with(|| context.available_extensions(install, recipes));
            if !available.contains(provider) {
                out.add(
                    path.clone(),
                    format!(
                        "Config actions cannot be applied to {} because the {} extension is not installed, and is not installed by this recipe or any of the recipes it depends on.",
                        config_name, provider
                    ),
                );
            }
        }

        for action_id in invocations.keys() {
            let action_id = key_label(action_id);
            if !context.action_exists(&action_id, &config_name) {
                out.add(
                    format!("{}[{}]", path, action_id),
                    format!("The \"{}\" plugin does not exist.", action_id),
                );
            }
        }
    }
}
