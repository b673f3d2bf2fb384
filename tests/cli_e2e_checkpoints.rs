//! End-to-end tests for the `checkpoints` and `rollback` commands.

mod common;

use common::prelude::*;

fn applied_fixture() -> AppFixture {
    let app = AppFixture::new()
        .with_standard_extensions()
        .with_recipe("install_node", "name: Install node\ninstall:\n  - node\n");
    app.command()
        .arg("recipe")
        .arg(app.recipe_path("install_node"))
        .assert()
        .success();
    app
}

#[test]
fn test_checkpoints_empty() {
    AppFixture::new()
        .command()
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoints"));
}

#[test]
fn test_checkpoints_lists_backup() {
    let app = applied_fixture();
    app.command()
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("LABEL"))
        .stdout(predicate::str::contains("Backup before the 'Install node' recipe."));
}

#[test]
fn test_rollback_restores_configuration() {
    let app = applied_fixture();
    assert!(app.config_path("node.settings").exists());

    let site = site_recipe::site::Site::open(
        app.path(),
        std::path::Path::new(site_recipe::site::DEFAULT_SITE_PATH),
    )
    .unwrap();
    let backup = site.checkpoints().latest().unwrap().unwrap();
    drop(site);

    app.command()
        .arg("rollback")
        .arg(&backup.id)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Rolled back to checkpoint {}",
            backup.id
        )))
        .stdout(predicate::str::contains("Uninstalled:"));

    assert!(!app.config_path("node.settings").exists());
    assert!(!app.config_path("user.role.anonymous").exists());
    app.child("sites/default/config/core.extension.yml")
        .assert(predicate::str::contains("node").not());

    // History is kept
    app.command()
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup before the 'Install node' recipe."));
}

#[test]
fn test_rollback_unknown_checkpoint() {
    AppFixture::new()
        .command()
        .arg("rollback")
        .arg("999")
        .assert()
        .failure()
        .code(1);
}
