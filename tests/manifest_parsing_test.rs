//! Manifest parsing tests using datatest-stable for test data discovery
//!
//! Every `recipe.yml` under `tests/testdata/valid` must parse; every one
//! under `tests/testdata/invalid` must be rejected. The recipe id is the name
//! of the directory holding the manifest, as it is for real recipes.
//!
//! Lookups are answered by [`NamingContext`]: anything whose name starts
//! with `missing` does not exist, everything else does.

use std::collections::BTreeSet;
use std::path::Path;

use site_recipe::error::Error;
use site_recipe::recipe::{manifest, ManifestContext};

struct NamingContext;

fn exists(name: &str) -> bool {
    !name.starts_with("missing")
}

impl ManifestContext for NamingContext {
    fn recipe_exists(&self, name: &str) -> bool {
        exists(name)
    }

    fn extension_exists(&self, name: &str) -> bool {
        exists(name)
    }

    fn available_extensions(&self, install: &[String], recipes: &[String]) -> BTreeSet<String> {
        // Dependencies are assumed to install whatever their config needs
        let mut available: BTreeSet<String> = install.iter().cloned().collect();
        if !recipes.is_empty() {
            available.extend(["system", "user", "node"].map(String::from));
        }
        available
    }

    fn action_exists(&self, action_id: &str, _config_name: &str) -> bool {
        exists(action_id)
    }
}

fn recipe_id(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Runs for each `recipe.yml` in the testdata directory.
fn test_manifest_parsing(path: &Path) -> datatest_stable::Result<()> {
    let id = recipe_id(path);
    let expect_valid = path.components().any(|c| c.as_os_str() == "valid");
    let result = manifest::parse(path, &id, &NamingContext);

    match (expect_valid, result) {
        (true, Ok(parsed)) => {
            assert!(!parsed.name.is_empty(), "{} has an empty name", path.display());
            Ok(())
        }
        (true, Err(e)) => Err(format!("{} should parse: {}", path.display(), e).into()),
        (false, Ok(_)) => Err(format!("{} should be rejected", path.display()).into()),
        (false, Err(Error::ManifestInvalid { violations, .. })) => {
            assert!(!violations.is_empty());
            Ok(())
        }
        (false, Err(Error::ManifestUnreadable { .. })) => Ok(()),
        (false, Err(e)) => Err(format!("{} failed for the wrong reason: {}", path.display(), e).into()),
    }
}

datatest_stable::harness!(test_manifest_parsing, "tests/testdata", r"recipe\.yml$");
