//! End-to-end tests for the read-only commands: `validate`, `tree` and
//! `completions`.

mod common;

use common::prelude::*;

fn diamond() -> AppFixture {
    AppFixture::new()
        .with_standard_extensions()
        .with_recipe("base", "name: Base\ninstall:\n  - system\n")
        .with_recipe("left", "name: Left\nrecipes:\n  - base\n")
        .with_recipe("right", "name: Right\nrecipes:\n  - base\n")
        .with_recipe("top", "name: Top\nrecipes:\n  - left\n  - right\n")
}

#[test]
fn test_validate_valid_recipe() {
    let app = diamond();
    app.command()
        .arg("validate")
        .arg(app.recipe_path("top"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Recipe is valid"))
        .stdout(predicate::str::contains("Recipes to apply: 4"))
        .stdout(predicate::str::contains("Extensions to install: system"));

    // Nothing was applied
    assert!(!app.config_path("system.site").exists());
}

#[test]
fn test_validate_invalid_recipe() {
    let app = AppFixture::new()
        .with_standard_extensions()
        .with_recipe("bad", "name: Bad\nrecipes:\n  - bad\n");
    app.command()
        .arg("validate")
        .arg(app.recipe_path("bad"))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("[ERR] Recipe is invalid"))
        .stderr(predicate::str::contains("The \"bad\" recipe cannot depend on itself."));
}

#[test]
fn test_tree_shows_dependencies_and_order() {
    let app = diamond();
    app.command()
        .arg("tree")
        .arg(app.recipe_path("top"))
        .arg("--order")
        .assert()
        .success()
        .stdout(predicate::str::contains("Top (top)"))
        .stdout(predicate::str::contains("Left (left)"))
        .stdout(predicate::str::contains("Base (base)"))
        .stdout(predicate::str::contains("1. base"))
        .stdout(predicate::str::contains("4. top"));
}

#[test]
fn test_tree_cycle() {
    let app = AppFixture::new()
        .with_recipe("a", "name: A\nrecipes:\n  - b\n")
        .with_recipe("b", "name: B\nrecipes:\n  - a\n");
    app.command()
        .arg("tree")
        .arg(app.recipe_path("a"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Circular recipe dependency detected: a -> b -> a",
        ));
}

#[test]
fn test_completions_bash() {
    cargo_bin_cmd!("site-recipe")
        .arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("site-recipe"))
        .stdout(predicate::str::contains("rollback"));
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("site-recipe")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("recipe"))
        .stdout(predicate::str::contains("checkpoints"))
        .stdout(predicate::str::contains("--site"));
}
