//! Wildcard config name expressions
//!
//! `user.role.*` refers to every stored `user.role.<id>`. An expression is a
//! wildcard expression when it contains `.*`; anything else is a plain config
//! name and refers only to itself.
//!
//! A wildcard expression must start with the config prefix of a known config
//! entity type. Each `*` matches one or more characters that are valid in a
//! config name segment, so it never crosses a `.`.

use regex::Regex;

use crate::entity::EntityTypeManager;
use crate::error::{Error, Result};
use crate::storage::ConfigStorage;

/// What a single `*` may match
const WILDCARD_CLASS: &str = r#"[^.:?*<>"'/\\]+"#;

/// Whether an expression needs to be expanded against storage
pub fn is_wildcard(expression: &str) -> bool {
    expression.contains(".*")
}

/// Compile a wildcard expression to an anchored regex
pub fn expression_regex(expression: &str) -> Result<Regex> {
    let escaped = regex::escape(expression).replace(r"\*", WILDCARD_CLASS);
    Ok(Regex::new(&format!("^{}$", escaped))?)
}

/// Every config name an expression refers to.
///
/// Plain names are returned as-is, whether or not they are stored.
pub fn matching_names(
    expression: &str,
    entity_types: &EntityTypeManager,
    storage: &dyn ConfigStorage,
) -> Result<Vec<String>> {
    if !is_wildcard(expression) {
        return Ok(vec![expression.to_string()]);
    }

    let entity_type = entity_types.entity_type_by_name(expression).ok_or_else(|| {
        Error::action(format!(
            "No installed config entity type uses the prefix in the expression '{}'. Either there is a typo in the expression or this recipe should install an additional module or depend on another recipe.",
            expression
        ))
    })?;

    let pattern = expression_regex(expression)?;
    Ok(storage
        .list_all(&format!("{}.", entity_type.prefix))?
        .into_iter()
        .filter(|name| pattern.is_match(name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ConfigEntityType;
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;

    fn entity_types() -> EntityTypeManager {
        let mut types = EntityTypeManager::new();
        types.register(ConfigEntityType::new("user_role", "user.role", "user"));
        types.register(ConfigEntityType::new(
            "entity_view_display",
            "core.entity_view_display",
            "core",
        ));
        types
    }

    fn storage(names: &[&str]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        for name in names {
            storage.insert_yaml(name, "{}").unwrap();
        }
        storage
    }

    #[test]
    fn test_plain_name_is_returned_as_is() {
        let names = matching_names("system.site", &entity_types(), &MemoryStorage::new()).unwrap();
        assert_eq!(names, vec!["system.site"]);
    }

    #[test]
    fn test_role_wildcard() {
        let storage = storage(&["user.role.anonymous", "user.role.authenticated", "user.settings"]);
        let names = matching_names("user.role.*", &entity_types(), &storage).unwrap();
        assert_eq!(names, vec!["user.role.anonymous", "user.role.authenticated"]);
    }

    #[test]
    fn test_wildcard_does_not_cross_segments() {
        let storage = storage(&[
            "core.entity_view_display.node.article.default",
            "core.entity_view_display.node.article.teaser",
            "core.entity_view_display.node.page.default",
            "core.entity_view_display.media.image.default",
        ]);
        let names =
            matching_names("core.entity_view_display.node.*.default", &entity_types(), &storage)
                .unwrap();
        assert_eq!(
            names,
            vec![
                "core.entity_view_display.node.article.default",
                "core.entity_view_display.node.page.default",
            ]
        );
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let err = matching_names("views.view.*", &entity_types(), &MemoryStorage::new()).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("No installed config entity type uses the prefix in the expression 'views.view.*'"));
    }

    proptest! {
        #[test]
        fn prop_single_wildcard_matches_any_plain_segment(segment in "[a-z0-9_]{1,16}") {
            let pattern = expression_regex("user.role.*").unwrap();
            let name = format!("user.role.{}", segment);
            prop_assert!(pattern.is_match(&name));
        }

        #[test]
        fn prop_wildcard_never_matches_dotted_segments(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let pattern = expression_regex("user.role.*").unwrap();
            let name = format!("user.role.{}.{}", a, b);
            prop_assert!(!pattern.is_match(&name));
        }
    }
}
