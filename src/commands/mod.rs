//! # CLI Command Implementations
//!
//! One module per subcommand of the `site-recipe` tool. Each module holds
//! an `Args` struct derived with `clap` and an `execute` function that calls
//! into the `site_recipe` library.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::GlobalOptions;

pub mod checkpoints;
pub mod completions;
pub mod recipe;
pub mod rollback;
pub mod tree;
pub mod validate;

/// Locate a recipe directory given on the command line.
///
/// Relative paths are taken from the working directory first and from the
/// application root otherwise.
pub fn recipe_dir(options: &GlobalOptions, path: &Path) -> PathBuf {
    let path = if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        options.root.join(path)
    };
    fs::canonicalize(&path).unwrap_or(path)
}
