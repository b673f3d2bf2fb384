//! Dependency ordering of configuration objects
//!
//! Config objects declare the objects they need under `dependencies.config`
//! (and `dependencies.enforced.config`). Creating objects in dependency order
//! means an object is never written before something it depends on.
//!
//! The traversal is depth-first and post-order: dependencies are emitted
//! before their dependents, and objects are visited in name order so the
//! result is deterministic. Dependencies outside the set being sorted are
//! ignored. Cycles cannot make the sort loop; an object already on the current
//! path is skipped.

use std::collections::{BTreeMap, HashSet};

use super::{string_list, ConfigData};

/// Names from `dependencies.config` and `dependencies.enforced.config`.
pub fn config_dependencies(data: &ConfigData) -> Vec<String> {
    let mut dependencies = string_list(data, "dependencies.config");
    for name in string_list(data, "dependencies.enforced.config") {
        if !dependencies.contains(&name) {
            dependencies.push(name);
        }
    }
    dependencies
}

/// Sort object names so that the least depended-upon objects come first
pub fn sort_by_dependencies(objects: &BTreeMap<String, ConfigData>) -> Vec<String> {
    let mut order = Vec::with_capacity(objects.len());
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();

    for name in objects.keys() {
        visit(name, objects, &mut order, &mut visited, &mut on_path);
    }

    order
}

fn visit(
    name: &str,
    objects: &BTreeMap<String, ConfigData>,
    order: &mut Vec<String>,
    visited: &mut HashSet<String>,
    on_path: &mut HashSet<String>,
) {
    if visited.contains(name) || on_path.contains(name) {
        return;
    }
    let Some(data) = objects.get(name) else {
        return;
    };

    on_path.insert(name.to_string());
    let mut dependencies = config_dependencies(data);
    dependencies.sort();
    for dependency in dependencies {
        visit(&dependency, objects, order, visited, on_path);
    }
    on_path.remove(name);

    visited.insert(name.to_string());
    order.push(name.to_string());
}
