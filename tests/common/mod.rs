//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let app = AppFixture::new()
//!         .with_standard_extensions()
//!         .with_recipe("install_node", "name: Install node\ninstall: [node]\n");
//!     app.command().arg("recipe").arg(app.recipe_path("install_node")).assert().success();
//! }
//! ```

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

use site_recipe::extension::{Extension, ExtensionCatalog};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::{catalog, extensions, AppFixture};
}

/// Extension info files and default config used across tests.
pub mod extensions {
    pub const SYSTEM_INFO: &str = "name: System\ntype: module\n";
    pub const USER_INFO: &str = r#"
name: User
type: module
dependencies:
  - drupal:system
config_entity_types:
  user_role:
    prefix: user.role
"#;
    pub const NODE_INFO: &str = r#"
name: Node
type: module
dependencies:
  - drupal:user
config_entity_types:
  node_type:
    prefix: node.type
"#;
    pub const OLIVERO_INFO: &str = "name: Olivero\ntype: theme\n";

    pub const ANONYMOUS_ROLE: &str = "id: anonymous\nlabel: Anonymous user\nweight: 0\npermissions: []\n";
    pub const AUTHENTICATED_ROLE: &str =
        "id: authenticated\nlabel: Authenticated user\nweight: 1\npermissions: []\n";

    /// Date formats must be complete and have a pattern
    pub const DATE_FORMAT_SCHEMA: &str = r#"
core.date_format.*:
  label: Date format
  constraints:
    FullyValidatable: ~
  mapping:
    id:
      type: string
    label:
      type: label
    pattern:
      type: string
      constraints:
        NotBlank: ~
"#;
}

/// The in-memory counterpart of [`AppFixture::with_standard_extensions`].
pub fn catalog() -> ExtensionCatalog {
    ExtensionCatalog::new()
        .with(
            Extension::module("system")
                .with_default_config("system.site", "name: Drupal\npage:\n  front: /user/login\n")
                .unwrap(),
        )
        .with(
            Extension::module("user")
                .with_dependencies(["drupal:system"])
                .with_entity_type("user_role", "user.role")
                .with_default_config("user.role.anonymous", extensions::ANONYMOUS_ROLE)
                .unwrap()
                .with_default_config("user.role.authenticated", extensions::AUTHENTICATED_ROLE)
                .unwrap(),
        )
        .with(
            Extension::module("node")
                .with_dependencies(["drupal:user"])
                .with_entity_type("node_type", "node.type")
                .with_default_config("node.settings", "use_admin_theme: false\n")
                .unwrap(),
        )
        .with(Extension::module("config_test").with_entity_type("config_test", "config_test.dynamic"))
        .with(Extension::theme("olivero"))
}

/// An application root on disk with an installed site.
///
/// The site lives at the default site path and starts with nothing
/// installed.
pub struct AppFixture {
    temp_dir: assert_fs::TempDir,
}

impl AppFixture {
    pub fn new() -> Self {
        let fixture = Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        };
        fixture.with_file(
            "sites/default/config/core.extension.yml",
            "module: {}\ntheme: {}\n",
        )
    }

    /// Add system, user, node and the olivero theme
    pub fn with_standard_extensions(self) -> Self {
        self.with_file("core/modules/system/system.info.yml", extensions::SYSTEM_INFO)
            .with_file(
                "core/modules/system/config/install/system.site.yml",
                "name: Drupal\npage:\n  front: /user/login\n",
            )
            .with_file(
                "core/modules/system/config/schema/system.schema.yml",
                extensions::DATE_FORMAT_SCHEMA,
            )
            .with_file("core/modules/user/user.info.yml", extensions::USER_INFO)
            .with_file(
                "core/modules/user/config/install/user.role.anonymous.yml",
                extensions::ANONYMOUS_ROLE,
            )
            .with_file(
                "core/modules/user/config/install/user.role.authenticated.yml",
                extensions::AUTHENTICATED_ROLE,
            )
            .with_file("core/modules/node/node.info.yml", extensions::NODE_INFO)
            .with_file(
                "core/modules/node/config/install/node.settings.yml",
                "use_admin_theme: false\n",
            )
            .with_file("core/themes/olivero/olivero.info.yml", extensions::OLIVERO_INFO)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add `recipes/<name>/recipe.yml`
    pub fn with_recipe(self, name: &str, manifest: &str) -> Self {
        self.with_file(&format!("recipes/{}/recipe.yml", name), manifest)
    }

    /// Add a config object shipped by a recipe
    pub fn with_recipe_config(self, recipe: &str, name: &str, yaml: &str) -> Self {
        self.with_file(&format!("recipes/{}/config/{}.yml", recipe, name), yaml)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn recipe_path(&self, name: &str) -> PathBuf {
        self.path().join("recipes").join(name)
    }

    /// The file holding a config object of the active configuration
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.path()
            .join("sites/default/config")
            .join(format!("{}.yml", name))
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// The CLI binary pointed at this application root
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("site-recipe");
        cmd.current_dir(self.path())
            .env_remove("SITE_RECIPE_ROOT")
            .env_remove("SITE_RECIPE_SITE_PATH")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never")
            .arg("--root")
            .arg(self.path());
        cmd
    }
}

impl Default for AppFixture {
    fn default() -> Self {
        Self::new()
    }
}
