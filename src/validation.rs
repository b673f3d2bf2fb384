//! # Configuration Validation
//!
//! Newly created config can be checked against the schema shipped by
//! extensions. Only objects whose schema is marked `FullyValidatable` are
//! checked; everything else passes untouched.
//!
//! Schema files are `config/schema/*.schema.yml` inside an extension. Each
//! top-level key is a config name or a `*` pattern:
//!
//! ```yaml
//! core.date_format.*:
//!   label: Date format
//!   constraints:
//!     FullyValidatable: ~
//!   mapping:
//!     id:
//!       type: string
//!     pattern:
//!       type: string
//!       constraints:
//!         NotBlank: ~
//!     locked:
//!       type: boolean
//! ```
//!
//! Supported field types are `string`, `label`, `text`, `boolean`, `integer`,
//! `float`, `mapping`, `sequence` and `ignore`. Supported field constraints are
//! `NotBlank`, `Regex` and `Choice`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::Pattern;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::extension::ExtensionCatalog;
use crate::storage::{value_kind, ConfigData};

/// Keys every config entity carries whether or not its schema lists them
const BASE_KEYS: [&str; 6] = [
    "uuid",
    "langcode",
    "status",
    "dependencies",
    "third_party_settings",
    "_core",
];

/// Checks a config object before it is written
pub trait ConfigValidator {
    /// Violations found, each rendered as `<key>: <message>`.
    ///
    /// An empty list means the object is valid or not subject to validation.
    fn validate(&self, name: &str, data: &ConfigData) -> Result<Vec<String>>;
}

/// A validator that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl ConfigValidator for NoValidation {
    fn validate(&self, _name: &str, _data: &ConfigData) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectSchema {
    #[serde(default)]
    constraints: Mapping,
    #[serde(default)]
    mapping: BTreeMap<String, FieldSchema>,
}

impl ObjectSchema {
    fn fully_validatable(&self) -> bool {
        self.constraints.contains_key("FullyValidatable")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSchema {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    constraints: Mapping,
}

#[derive(Debug, Clone)]
struct SchemaEntry {
    pattern: Pattern,
    literal_len: usize,
    schema: ObjectSchema,
}

/// Validator driven by extension schema files
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    entries: Vec<SchemaEntry>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the schema files of every extension in the catalog
    pub fn from_catalog(catalog: &ExtensionCatalog) -> Result<Self> {
        let mut validator = Self::new();
        for extension in catalog.iter() {
            if let Some(dir) = extension.schema_directory() {
                validator.load_directory(&dir)?;
            }
        }
        Ok(validator)
    }

    /// Load every `*.schema.yml` file in a directory
    pub fn load_directory(&mut self, dir: &Path) -> Result<()> {
        let pattern = dir.join("*.schema.yml");
        let pattern = pattern.to_string_lossy();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| Error::Config {
                name: dir.display().to_string(),
                message: e.to_string(),
            })?;
            debug!("Loading config schema {}", path.display());
            let raw = fs::read_to_string(&path)?;
            self.add_schema_yaml(&raw).map_err(|e| Error::Config {
                name: path.display().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Add every schema defined in a YAML document
    pub fn add_schema_yaml(&mut self, raw: &str) -> Result<()> {
        let schemas: BTreeMap<String, ObjectSchema> = serde_yaml::from_str(raw)?;
        for (name, schema) in schemas {
            let literal_len = name.chars().filter(|c| *c != '*').count();
            self.entries.push(SchemaEntry {
                pattern: Pattern::new(&name)?,
                literal_len,
                schema,
            });
        }
        Ok(())
    }

    pub fn with_schema_yaml(mut self, raw: &str) -> Result<Self> {
        self.add_schema_yaml(raw)?;
        Ok(self)
    }

    fn schema_for(&self, name: &str) -> Option<&ObjectSchema> {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.matches(name))
            .max_by_key(|entry| entry.literal_len)
            .map(|entry| &entry.schema)
    }

    /// Whether the schema for `name` opts into full validation
    pub fn is_fully_validatable(&self, name: &str) -> bool {
        self.schema_for(name)
            .is_some_and(ObjectSchema::fully_validatable)
    }
}

impl ConfigValidator for SchemaValidator {
    fn validate(&self, name: &str, data: &ConfigData) -> Result<Vec<String>> {
        let Some(schema) = self.schema_for(name) else {
            return Ok(Vec::new());
        };
        if !schema.fully_validatable() {
            return Ok(Vec::new());
        }

        let mut violations = Vec::new();
        for (key, field) in &schema.mapping {
            match data.get(key.as_str()) {
                None => violations.push(format!("{}: '{}' is a required key.", key, key)),
                Some(value) => check_field(key, field, value, &mut violations)?,
            }
        }
        for key in data.keys() {
            let key = match key.as_str() {
                Some(key) => key,
                None => {
                    violations.push(format!("{:?}: Keys must be strings.", key));
                    continue;
                }
            };
            if !schema.mapping.contains_key(key) && !BASE_KEYS.contains(&key) {
                violations.push(format!("{}: '{}' is not a supported key.", key, key));
            }
        }
        Ok(violations)
    }
}

fn type_matches(kind: &str, value: &Value) -> bool {
    match kind {
        "string" | "label" | "text" => value.is_string(),
        "boolean" => value.is_bool(),
        "integer" => value.is_i64() || value.is_u64(),
        "float" => value.is_number(),
        "mapping" => value.is_mapping(),
        "sequence" => value.is_sequence(),
        _ => true,
    }
}

/// Schema regexes are written `/.../` with PCRE delimiters
fn strip_delimiters(pattern: &str) -> &str {
    match pattern.strip_prefix('/').and_then(|p| p.strip_suffix('/')) {
        Some(inner) => inner,
        None => pattern,
    }
}

fn check_field(key: &str, field: &FieldSchema, value: &Value, violations: &mut Vec<String>) -> Result<()> {
    if value.is_null() {
        if !field.nullable {
            violations.push(format!("{}: This value should not be null.", key));
        }
        return Ok(());
    }
    if !type_matches(&field.kind, value) {
        violations.push(format!(
            "{}: This value should be of the correct primitive type ({} given, {} expected).",
            key,
            value_kind(value),
            field.kind
        ));
        return Ok(());
    }

    if field.constraints.contains_key("NotBlank") {
        let blank = match value {
            Value::String(s) => s.trim().is_empty(),
            Value::Sequence(s) => s.is_empty(),
            Value::Mapping(m) => m.is_empty(),
            _ => false,
        };
        if blank {
            violations.push(format!("{}: This value should not be blank.", key));
        }
    }

    if let Some(rule) = field.constraints.get("Regex") {
        let pattern = match rule {
            Value::String(pattern) => Some(pattern.as_str()),
            Value::Mapping(options) => options.get("pattern").and_then(Value::as_str),
            _ => None,
        };
        if let (Some(pattern), Some(text)) = (pattern, value.as_str()) {
            if !Regex::new(strip_delimiters(pattern))?.is_match(text) {
                violations.push(format!("{}: This value is not valid.", key));
            }
        }
    }

    if let Some(rule) = field.constraints.get("Choice") {
        let choices = match rule {
            Value::Sequence(choices) => Some(choices),
            Value::Mapping(options) => options.get("choices").and_then(Value::as_sequence),
            _ => None,
        };
        if let Some(choices) = choices {
            if !choices.contains(value) {
                violations.push(format!("{}: The value you selected is not a valid choice.", key));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::decode_yaml;

    const DATE_FORMAT_SCHEMA: &str = r#"
core.date_format.*:
  label: Date format
  constraints:
    FullyValidatable: ~
  mapping:
    id:
      type: string
      constraints:
        Regex: '/^[a-z0-9_]+$/'
    label:
      type: label
      constraints:
        NotBlank: ~
    pattern:
      type: string
      constraints:
        NotBlank: ~
    locked:
      type: boolean
system.site:
  label: Site information
  mapping:
    name:
      type: label
"#;

    fn validator() -> SchemaValidator {
        SchemaValidator::new()
            .with_schema_yaml(DATE_FORMAT_SCHEMA)
            .unwrap()
    }

    #[test]
    fn test_valid_object_passes() {
        let data = decode_yaml(
            "id: short\nlabel: Short\npattern: 'm/d/Y'\nlocked: false\nlangcode: en\nstatus: true\n",
        )
        .unwrap();
        assert!(validator().validate("core.date_format.short", &data).unwrap().is_empty());
    }

    #[test]
    fn test_violations_are_collected() {
        let data = decode_yaml("id: invalid\nlabel: Invalid\npattern: ''\nlocked: 'no'\nextra: 1\n").unwrap();
        let violations = validator().validate("core.date_format.invalid", &data).unwrap();
        assert!(violations.contains(&"pattern: This value should not be blank.".to_string()));
        assert!(violations.iter().any(|v| v.starts_with("locked: This value should be of the correct primitive type")));
        assert!(violations.contains(&"extra: 'extra' is not a supported key.".to_string()));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_missing_key_and_choice() {
        let validator = SchemaValidator::new()
            .with_schema_yaml(
                "a.b:\n  constraints:\n    FullyValidatable: ~\n  mapping:\n    size:\n      type: string\n      constraints:\n        Choice: [small, large]\n    weight:\n      type: integer\n",
            )
            .unwrap();
        let violations = validator
            .validate("a.b", &decode_yaml("size: medium\n").unwrap())
            .unwrap();
        assert_eq!(
            violations,
            vec![
                "size: The value you selected is not a valid choice.".to_string(),
                "weight: 'weight' is a required key.".to_string(),
            ]
        );
    }

    #[test]
    fn test_regex_constraint_mapping_form() {
        let validator = SchemaValidator::new()
            .with_schema_yaml(
                "a.b:\n  constraints:\n    FullyValidatable: ~\n  mapping:\n    id:\n      type: string\n      constraints:\n        Regex:\n          pattern: '^[a-z]+$'\n",
            )
            .unwrap();
        assert!(validator.validate("a.b", &decode_yaml("id: abc").unwrap()).unwrap().is_empty());
        assert_eq!(
            validator.validate("a.b", &decode_yaml("id: ABC").unwrap()).unwrap(),
            vec!["id: This value is not valid.".to_string()]
        );
    }

    #[test]
    fn test_not_fully_validatable_is_skipped() {
        let validator = validator();
        assert!(!validator.is_fully_validatable("system.site"));
        assert!(validator.is_fully_validatable("core.date_format.long"));
        let data = decode_yaml("name: 5\nunknown: true\n").unwrap();
        assert!(validator.validate("system.site", &data).unwrap().is_empty());
        assert!(validator.validate("no.schema", &data).unwrap().is_empty());
    }
}
