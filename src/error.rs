//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `site-recipe` library. It uses the `thiserror` library to create a single
//! `Error` enum that covers every failure mode of recipe parsing, dependency
//! resolution, config actions, checkpoints and application.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant corresponds to one kind of
//!   failure and carries enough context to produce a readable message.
//! - **`Violation`**: A single schema violation found while validating a
//!   recipe manifest. Violations are aggregated so that every problem in a
//!   manifest is reported at once.
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! The variants fall into these groups:
//!
//! - Manifest errors (missing, unreadable, invalid).
//! - Discovery and dependency errors (recipe not found, circular dependency).
//! - Configuration errors (pre-existing mismatch, validation failure, import).
//! - Config action errors (unknown action, duplicate shorthand, apply failure).
//! - Checkpoint errors (exists, unknown, empty log).
//! - Plumbing errors wrapped from I/O, YAML, JSON, regex and glob.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single validation failure inside a recipe manifest.
///
/// `property_path` uses the bracketed form of the validator it mirrors, for
/// example `[recipes][0]` or `[config][actions][user.role.editor]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Where in the manifest the violation was found
    pub property_path: String,
    /// Human readable description of the problem
    pub message: String,
}

impl Violation {
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property_path, self.message)
    }
}

fn bullet_list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("\n  - {}", item))
        .collect::<String>()
}

/// Main error type for site-recipe operations
#[derive(Error, Debug)]
pub enum Error {
    /// There is no `recipe.yml` at the expected location.
    #[error("There is no {} file", path.display())]
    ManifestMissing { path: PathBuf },

    /// The manifest exists but could not be read or decoded.
    #[error("Recipe manifest {} could not be read: {message}", path.display())]
    ManifestUnreadable { path: PathBuf, message: String },

    /// The manifest was decoded but failed schema validation.
    ///
    /// Every violation found is reported, not just the first.
    #[error("Validation errors were found in {}:{}", path.display(), bullet_list(violations))]
    ManifestInvalid {
        path: PathBuf,
        violations: Vec<Violation>,
    },

    /// Discovery exhausted every search root without finding the recipe.
    #[error("Can not find the {recipe} recipe, search paths: {}", search_paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    RecipeNotFound {
        recipe: String,
        search_paths: Vec<PathBuf>,
    },

    /// A recipe depends on itself, directly or transitively.
    #[error("Circular recipe dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// The recipe ships configuration that already exists with different content.
    #[error("The configuration '{}' exists already and does not match the recipe's configuration", names.join("', '"))]
    PreExistingConfig { recipe: String, names: Vec<String> },

    /// Neither a fully-qualified nor a shorthand action id resolved.
    #[error("The \"{action_id}\" plugin does not exist.")]
    ActionNotFound { action_id: String },

    /// Two actions derive the same shorthand id for one entity type.
    #[error("The plugins '{first}' and '{second}' both resolve to the same shorthand action ID for the '{entity_type}' entity type")]
    DuplicateShorthand {
        first: String,
        second: String,
        entity_type: String,
    },

    /// A config action failed to apply.
    #[error("{message}")]
    ConfigAction { message: String },

    /// An entity method action received data its parameters cannot accept.
    #[error("{message}")]
    EntityMethod { message: String },

    /// A newly created, fully validatable config object has violations.
    #[error("There were validation errors in {name}:{}", bullet_list(violations))]
    InvalidConfig {
        name: String,
        violations: Vec<String>,
    },

    /// A checkpoint with the same label already exists.
    #[error("A checkpoint with the label '{label}' already exists")]
    CheckpointExists { label: String },

    /// The requested checkpoint id is not in the log.
    #[error("The checkpoint '{id}' does not exist")]
    UnknownCheckpoint { id: String },

    /// The log is empty and cannot be read.
    #[error("This storage cannot be read because there are no checkpoints")]
    NoCheckpoints,

    /// An extension name that no extension list knows about.
    #[error("Unknown extension: {name}")]
    UnknownExtension { name: String },

    /// A write was attempted through a read-only storage view.
    #[error("Storage is read-only: {operation} is not supported")]
    ReadOnlyStorage { operation: String },

    /// Config import (sync or rollback) failed validation or a write.
    #[error("Config import error: {message}")]
    ConfigImport { message: String },

    /// Applying failed and so did rolling back to the backup checkpoint; the
    /// site is left partly applied.
    #[error("{source}\nRolling back to checkpoint {checkpoint} failed as well: {rollback}")]
    RollbackFailed {
        source: Box<Error>,
        checkpoint: String,
        rollback: Box<Error>,
    },

    /// A config object or schema file could not be understood.
    #[error("Configuration error in {name}: {message}")]
    Config { name: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// An error indicating that a lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

impl Error {
    /// Shorthand for building a [`Error::ConfigAction`].
    pub fn action(message: impl Into<String>) -> Self {
        Error::ConfigAction {
            message: message.into(),
        }
    }

    /// Whether this error was raised while validating newly created config.
    pub fn is_invalid_config(&self) -> bool {
        match self {
            Error::InvalidConfig { .. } => true,
            Error::RollbackFailed { source, .. } => source.is_invalid_config(),
            _ => false,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_manifest_missing() {
        let error = Error::ManifestMissing {
            path: PathBuf::from("recipes/no_recipe/recipe.yml"),
        };
        assert_eq!(
            error.to_string(),
            "There is no recipes/no_recipe/recipe.yml file"
        );
    }

    #[test]
    fn test_error_display_manifest_invalid_lists_every_violation() {
        let error = Error::ManifestInvalid {
            path: PathBuf::from("r/recipe.yml"),
            violations: vec![
                Violation::new("[name]", "This field is missing."),
                Violation::new("[recipes][0]", "The r recipe cannot depend on itself."),
            ],
        };
        let display = error.to_string();
        assert!(display.contains("Validation errors were found in r/recipe.yml"));
        assert!(display.contains("[name]: This field is missing."));
        assert!(display.contains("[recipes][0]: The r recipe cannot depend on itself."));
    }

    #[test]
    fn test_error_display_recipe_not_found() {
        let error = Error::RecipeNotFound {
            recipe: "missing".to_string(),
            search_paths: vec![PathBuf::from("/a/recipes"), PathBuf::from("/a/core/recipes")],
        };
        assert_eq!(
            error.to_string(),
            "Can not find the missing recipe, search paths: /a/recipes, /a/core/recipes"
        );
    }

    #[test]
    fn test_error_display_duplicate_shorthand() {
        let error = Error::DuplicateShorthand {
            first: "entity_method:config_test.dynamic:setProtectedProperty".to_string(),
            second: "config_action_duplicate_test:config_test.dynamic:setProtectedProperty"
                .to_string(),
            entity_type: "config_test".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "The plugins 'entity_method:config_test.dynamic:setProtectedProperty' and \
             'config_action_duplicate_test:config_test.dynamic:setProtectedProperty' both \
             resolve to the same shorthand action ID for the 'config_test' entity type"
        );
    }

    #[test]
    fn test_error_display_rollback_failed_keeps_both_errors() {
        let error = Error::RollbackFailed {
            source: Box::new(Error::InvalidConfig {
                name: "core.date_format.broken".to_string(),
                violations: vec!["pattern: This value should not be blank.".to_string()],
            }),
            checkpoint: "1".to_string(),
            rollback: Box::new(Error::UnknownCheckpoint { id: "1".to_string() }),
        };
        assert!(error.is_invalid_config());
        assert_eq!(
            error.to_string(),
            "There were validation errors in core.date_format.broken:\n  - pattern: This value should not be blank.\n\
             Rolling back to checkpoint 1 failed as well: The checkpoint '1' does not exist"
        );
    }

    #[test]
    fn test_error_display_invalid_config() {
        let error = Error::InvalidConfig {
            name: "core.date_format.invalid".to_string(),
            violations: vec!["pattern: This value should not be blank.".to_string()],
        };
        let display = error.to_string();
        assert!(display.starts_with("There were validation errors in core.date_format.invalid:"));
        assert!(display.contains("- pattern: This value should not be blank."));
        assert!(error.is_invalid_config());
    }

    #[test]
    fn test_error_display_checkpoints() {
        assert_eq!(
            Error::NoCheckpoints.to_string(),
            "This storage cannot be read because there are no checkpoints"
        );
        assert!(Error::UnknownCheckpoint {
            id: "42".to_string()
        }
        .to_string()
        .contains("'42'"));
        assert!(Error::CheckpointExists {
            label: "Backup".to_string()
        }
        .to_string()
        .contains("'Backup' already exists"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(error.to_string().contains("YAML parsing error"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        assert!(error.to_string().contains("File not found"));
    }
}
