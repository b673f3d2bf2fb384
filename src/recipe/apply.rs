//! The checkpoint/rollback boundary around applying a recipe

use std::path::Path;

use log::{error, info, warn};

use crate::checkpoint::{CheckpointOutcome, CheckpointStorage};
use crate::error::{Error, Result};
use crate::site::Site;

/// What applying a recipe did
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// The recipe's name
    pub recipe: String,
    /// Ids of the applied recipes in order, the requested one last
    pub applied: Vec<String>,
    /// The checkpoint taken before anything changed
    pub backup: CheckpointOutcome,
}

impl ApplyReport {
    /// The notice to show when no backup checkpoint was created
    pub fn notice(&self) -> Option<String> {
        match &self.backup {
            CheckpointOutcome::Created(_) => None,
            CheckpointOutcome::Unchanged(checkpoint) => Some(format!(
                "A backup checkpoint was not created because nothing has changed since the \"{}\" checkpoint was created.",
                checkpoint.label
            )),
        }
    }
}

/// Label for the checkpoint taken before applying `recipe_name`.
///
/// Labels are unique in a log, so a recipe applied again gets a numbered
/// label.
pub fn backup_label(checkpoints: &CheckpointStorage, recipe_name: &str) -> Result<String> {
    let base = format!("Backup before the '{}' recipe.", recipe_name);
    if !checkpoints.has_label(&base)? {
        return Ok(base);
    }
    let mut n = 2;
    loop {
        let label = format!("{} ({})", base, n);
        if !checkpoints.has_label(&label)? {
            return Ok(label);
        }
        n += 1;
    }
}

/// Validate, checkpoint and apply the recipe in `recipe_dir`.
///
/// Loading and validation happen before the checkpoint and change nothing.
/// If applying fails, the site is rolled back to the checkpoint and the
/// error is returned. When the rollback fails too, both errors come back as
/// [`Error::RollbackFailed`].
pub fn apply_recipe(site: &Site, recipe_dir: &Path) -> Result<ApplyReport> {
    let tree = site.loader().resolve(recipe_dir)?;
    let recipe = &tree.root.recipe;

    let checkpoints = site.checkpoints();
    let label = backup_label(checkpoints, &recipe.name)?;
    let backup = checkpoints.checkpoint(&label)?;
    if !backup.is_created() {
        warn!(
            "Not creating a backup checkpoint, nothing changed since '{}'",
            backup.checkpoint().label
        );
    }

    match site.runner().run(&tree) {
        Ok(applied) => {
            info!("{} applied successfully", recipe.name);
            Ok(ApplyReport {
                recipe: recipe.name.clone(),
                applied,
                backup,
            })
        }
        Err(err) => {
            warn!(
                "Applying {} failed, rolling back to checkpoint {}",
                recipe.id,
                backup.checkpoint().id
            );
            match site.rollback_to(&backup.checkpoint().id) {
                Ok(_) => Err(err),
                Err(rollback_err) => {
                    error!("Rollback after a failed recipe failed: {}", rollback_err);
                    Err(Error::RollbackFailed {
                        source: Box::new(err),
                        checkpoint: backup.checkpoint().id.clone(),
                        rollback: Box::new(rollback_err),
                    })
                }
            }
        }
    }
}
