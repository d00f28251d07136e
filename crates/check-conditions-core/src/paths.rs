//! Where each resource type keeps its conditions
//!
//! Almost every resource uses `status.conditions`. A few controllers store
//! them elsewhere; those are listed here or in the `conditionPaths` section
//! of the config file instead of being special-cased in the scanner.

use serde_json::Value;

use crate::rules::Pattern;
use crate::error::Result;

pub const DEFAULT_CONDITIONS_PATH: &str = "status.conditions";

const BUILTIN_OVERRIDES: &[(&str, &str, &str)] = &[
    ("*", "hetznerbaremetalhosts", "spec.status.conditions"),
];

#[derive(Debug, Clone)]
struct PathOverride {
    group: Pattern,
    resource: Pattern,
    path: Vec<String>,
}

/// Lookup table from resource type to the dotted path of its conditions array
#[derive(Debug, Clone)]
pub struct ConditionPaths {
    default: Vec<String>,
    overrides: Vec<PathOverride>,
}

impl Default for ConditionPaths {
    fn default() -> Self {
        Self {
            default: split_path(DEFAULT_CONDITIONS_PATH),
            overrides: Vec::new(),
        }
    }
}

impl ConditionPaths {
    /// Default path plus the built-in overrides
    pub fn builtin() -> Result<Self> {
        let mut paths = Self::default();
        for (group, resource, path) in BUILTIN_OVERRIDES {
            paths.add_override(group, resource, path)?;
        }
        Ok(paths)
    }

    /// Register a path for matching resource types. Later entries take precedence.
    pub fn add_override(&mut self, group: &str, resource: &str, path: &str) -> Result<()> {
        self.overrides.push(PathOverride {
            group: Pattern::compile("group", &crate::rules::canonical_group(group))?,
            resource: Pattern::compile("resource", resource)?,
            path: split_path(path),
        });
        Ok(())
    }

    pub fn path_for(&self, group: &str, resource: &str) -> &[String] {
        self.overrides
            .iter()
            .rev()
            .find(|o| o.group.matches(group) && o.resource.matches(resource))
            .map(|o| o.path.as_slice())
            .unwrap_or(&self.default)
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

/// Follow a dotted path through nested JSON objects
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_path() {
        let paths = ConditionPaths::builtin().unwrap();
        assert_eq!(paths.path_for("apps", "deployments"), ["status", "conditions"]);
    }

    #[test]
    fn test_builtin_override() {
        let paths = ConditionPaths::builtin().unwrap();
        assert_eq!(
            paths.path_for("infrastructure.cluster.x-k8s.io", "hetznerbaremetalhosts"),
            ["spec", "status", "conditions"]
        );
    }

    #[test]
    fn test_later_override_wins() {
        let mut paths = ConditionPaths::builtin().unwrap();
        paths
            .add_override("*", "hetznerbaremetalhosts", "status.hostConditions")
            .unwrap();
        paths.add_override("example.com", "widgets", "state.conditions").unwrap();

        assert_eq!(
            paths.path_for("x", "hetznerbaremetalhosts"),
            ["status", "hostConditions"]
        );
        assert_eq!(paths.path_for("example.com", "widgets"), ["state", "conditions"]);
        assert_eq!(paths.path_for("other.com", "widgets"), ["status", "conditions"]);
    }

    #[test]
    fn test_core_override_only_applies_to_core_group() {
        let mut paths = ConditionPaths::default();
        paths.add_override("core", "nodes", "status.nodeConditions").unwrap();
        assert_eq!(paths.path_for("", "nodes"), ["status", "nodeConditions"]);
        assert_eq!(paths.path_for("longhorn.io", "nodes"), ["status", "conditions"]);
    }

    #[test]
    fn test_lookup() {
        let obj = json!({"spec": {"status": {"conditions": [1, 2]}}});
        assert_eq!(
            lookup(&obj, &["spec", "status", "conditions"]),
            Some(&json!([1, 2]))
        );
        assert_eq!(lookup(&obj, &["status", "conditions"]), None);
        assert_eq!(lookup(&obj, &[] as &[&str]), Some(&obj));
    }
}
