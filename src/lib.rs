//! # Site Recipe Library
//!
//! This library applies declarative site recipes. A recipe names the modules
//! and themes to install, the configuration to create and the config actions
//! to run, and may depend on other recipes. Recipes are applied inside a
//! checkpoint: if anything fails, the configuration is rolled back to the
//! state it had before.
//!
//! ## Quick Example
//!
//! ```
//! use site_recipe::extension::{Extension, ExtensionCatalog, ExtensionInstaller};
//! use site_recipe::site::Site;
//! use site_recipe::storage::ConfigStorage;
//!
//! let catalog = ExtensionCatalog::new().with(
//!     Extension::module("node")
//!         .with_default_config("node.settings", "use_admin_theme: false")
//!         .unwrap(),
//! );
//! let site = Site::in_memory("/app", catalog).unwrap();
//!
//! let outcome = site.checkpoints().checkpoint("Before node").unwrap();
//! site.installer().install(&["node".to_string()], None).unwrap();
//! assert!(site.is_installed("node").unwrap());
//! assert!(site.active().exists("node.settings").unwrap());
//!
//! site.rollback_to(&outcome.checkpoint().id).unwrap();
//! assert!(!site.is_installed("node").unwrap());
//! ```
//!
//! ## Core Concepts
//!
//! - **Storage (`storage`)**: configuration objects are named YAML mappings
//!   behind the `ConfigStorage` trait, with memory and file backends,
//!   read-only composed views and a comparer/importer used for rollback.
//! - **Extensions (`extension`, `entity`)**: the modules and themes a site
//!   can install, the config entity types they declare and the installer
//!   recording installed extensions in `core.extension`.
//! - **Config actions (`action`)**: named operations on config objects,
//!   addressed by full id or by a shorthand per entity type.
//! - **Checkpoints (`checkpoint`)**: an append-only log of configuration
//!   snapshots that the active configuration can be rolled back to.
//! - **Recipes (`recipe`)**: manifest validation, discovery, dependency
//!   resolution and the runner.
//! - **Validation (`validation`)**: schema checks for newly created config.
//!
//! ## Execution Flow
//!
//! 1.  **Load**: the recipe and, recursively, its dependencies are parsed and
//!     validated. Nothing changes if any of them is invalid.
//! 2.  **Checkpoint**: the current configuration is snapshotted.
//! 3.  **Run**: each recipe, dependencies first, installs its extensions,
//!     creates its config and applies its config actions.
//! 4.  **Rollback**: on failure, the snapshot is imported back.

pub mod action;
pub mod checkpoint;
pub mod entity;
pub mod error;
pub mod extension;
pub mod recipe;
pub mod site;
pub mod storage;
pub mod validation;
