//! Rule configuration file
//!
//! Looked up as `.config/check-conditions/check-conditions.yaml`, starting in the
//! working directory and walking upwards. Each resource entry lists condition
//! matchers which suppress conditions with status `True` (`skipIfTrue`) or
//! `False` (`skipIfFalse`):
//!
//! ```yaml
//! resources:
//!   - name: deployments
//!     resourceGroup: apps
//!     skipIfTrue:
//!       - type: Progressing
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::Disagreement;
use crate::error::{CoreError, Result};
use crate::paths::ConditionPaths;
use crate::rules::{RuleSet, WILDCARD};

/// Location of the config file relative to a project or home directory
pub const CONFIG_REL_PATH: &str = ".config/check-conditions/check-conditions.yaml";

const BUILTIN_CONFIG: &str = include_str!("builtin-config.yaml");

/// Contents of a rule configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition_paths: Vec<ConditionPathConfig>,

    /// Where this config was read from and is saved to
    #[serde(skip)]
    path: Option<PathBuf>,
}

/// Suppression matchers for one resource type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default, alias = "group", skip_serializing_if = "String::is_empty")]
    pub resource_group: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_if_true: Vec<ConditionMatcher>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_if_false: Vec<ConditionMatcher>,
}

/// One matcher; empty reason or message means any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionMatcher {
    #[serde(rename = "type", default)]
    pub condition_type: String,

    /// Never valid in a file; the status is given by the list the matcher is in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ConditionMatcher {
    pub fn new(condition_type: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            ..Default::default()
        }
    }

    fn same_as(&self, other: &ConditionMatcher) -> bool {
        self.condition_type == other.condition_type
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Where to find the conditions of matching resource types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionPathConfig {
    pub resource: String,

    #[serde(default = "wildcard")]
    pub group: String,

    pub path: String,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

fn wildcard_or(value: &str) -> &str {
    if value.trim().is_empty() {
        WILDCARD
    } else {
        value
    }
}

impl RuleConfig {
    /// Parse and validate a YAML document. `origin` is used in error messages.
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The config compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CONFIG, "<built-in>")
    }

    /// Load from a specific path. A missing file yields an empty config bound to that path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::info!(path = %path.display(), "loading rule config");
                Self::from_yaml(&content, &path.display().to_string())?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "rule config does not exist");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Search `start` and its parents for the config file.
    ///
    /// The search stops before reaching `/` or `/home`; neither is checked.
    pub fn discover(start: &Path) -> Result<Option<PathBuf>> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_REL_PATH);
            match std::fs::metadata(&candidate) {
                Ok(meta) if !meta.is_dir() => return Ok(Some(candidate)),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            let Some(parent) = dir.parent() else {
                return Ok(None);
            };
            if parent == dir || parent == Path::new("/") || parent == Path::new("/home") {
                return Ok(None);
            }
            dir = parent.to_path_buf();
        }
    }

    /// Path used when no config file was found: `$HOME/.config/check-conditions/...`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(home.join(CONFIG_REL_PATH))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Bind to the default path unless a path is already set
    pub fn ensure_path(&mut self) -> Result<&Path> {
        if self.path.is_none() {
            self.path = Some(Self::default_path()?);
        }
        self.path.as_deref().ok_or(CoreError::ConfigPathNotSet)
    }

    fn validate(&self) -> Result<()> {
        for resource in &self.resources {
            if resource.resource_group.trim().is_empty() {
                return Err(CoreError::InvalidConfig {
                    message: format!("resource {:?} is missing resourceGroup", resource.name),
                });
            }
            for (field, matchers) in [
                ("skipIfTrue", &resource.skip_if_true),
                ("skipIfFalse", &resource.skip_if_false),
            ] {
                for matcher in matchers {
                    if !matcher.status.trim().is_empty() {
                        return Err(CoreError::InvalidConfig {
                            message: format!(
                                "resource {:?} {} entry must not set status",
                                resource.name, field
                            ),
                        });
                    }
                    if matcher.condition_type.trim().is_empty() {
                        return Err(CoreError::InvalidConfig {
                            message: format!(
                                "resource {:?} {} entry is missing type",
                                resource.name, field
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Compile all matchers into classification rules
    pub fn build_rules(&self) -> Result<RuleSet> {
        self.validate()?;
        let mut rules = RuleSet::new();
        for resource in &self.resources {
            let name = wildcard_or(&resource.name);
            for (status, matchers) in [
                ("True", &resource.skip_if_true),
                ("False", &resource.skip_if_false),
            ] {
                for matcher in matchers {
                    rules.add_rule(
                        &resource.resource_group,
                        name,
                        &matcher.condition_type,
                        status,
                        wildcard_or(&matcher.reason),
                        wildcard_or(&matcher.message),
                    )?;
                }
            }
        }
        Ok(rules)
    }

    /// Register this config's condition paths on top of `paths`
    pub fn apply_paths(&self, paths: &mut ConditionPaths) -> Result<()> {
        for entry in &self.condition_paths {
            paths.add_override(&entry.group, &entry.resource, &entry.path)?;
        }
        Ok(())
    }

    /// Record a condition the legacy engine suppresses as a config rule.
    ///
    /// The matcher keeps the condition's reason and message when they are set,
    /// so a narrow ignore stays narrow. Returns `false` when an equivalent
    /// matcher already exists.
    pub fn add_legacy_ignore(&mut self, disagreement: &Disagreement) -> bool {
        let group = if disagreement.group.trim().is_empty() {
            "core"
        } else {
            disagreement.group.as_str()
        };
        let resource = self.resource_entry(group, &disagreement.resource);
        let matcher = ConditionMatcher {
            reason: disagreement.reason.trim().to_string(),
            message: disagreement.message.trim().to_string(),
            ..ConditionMatcher::new(&disagreement.condition_type)
        };

        let status = disagreement.status.trim();
        let into_true = !status.eq_ignore_ascii_case("false");
        let into_false = !status.eq_ignore_ascii_case("true");

        let mut added = false;
        for (wanted, list) in [
            (into_true, &mut resource.skip_if_true),
            (into_false, &mut resource.skip_if_false),
        ] {
            if wanted && !list.iter().any(|m| m.same_as(&matcher)) {
                list.push(matcher.clone());
                added = true;
            }
        }
        added
    }

    fn resource_entry(&mut self, group: &str, name: &str) -> &mut ResourceConfig {
        let position = self
            .resources
            .iter()
            .position(|r| r.name == name && r.resource_group == group);
        let index = match position {
            Some(index) => index,
            None => {
                self.resources.push(ResourceConfig {
                    name: name.to_string(),
                    resource_group: group.to_string(),
                    ..Default::default()
                });
                self.resources.len() - 1
            }
        };
        &mut self.resources[index]
    }

    /// Save to the bound path
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or(CoreError::ConfigPathNotSet)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// The built-in config plus the user config, compiled together
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    builtin: Option<RuleConfig>,
    user: RuleConfig,
}

impl EffectiveConfig {
    pub fn new(builtin: Option<RuleConfig>, user: RuleConfig) -> Self {
        Self { builtin, user }
    }

    /// Load the user config from `explicit`, or from the discovered path when `None`
    pub fn load(explicit: Option<&Path>, cwd: &Path, skip_builtin: bool) -> Result<Self> {
        let builtin = if skip_builtin {
            None
        } else {
            Some(RuleConfig::builtin()?)
        };

        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => RuleConfig::discover(cwd)?,
        };
        let user = match path {
            Some(path) => RuleConfig::load_from(&path)?,
            None => {
                tracing::debug!("no rule config found");
                RuleConfig::default()
            }
        };
        Ok(Self { builtin, user })
    }

    pub fn user(&self) -> &RuleConfig {
        &self.user
    }

    pub fn user_mut(&mut self) -> &mut RuleConfig {
        &mut self.user
    }

    /// Built-in rules first, then user rules
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = match &self.builtin {
            Some(builtin) => builtin.build_rules()?,
            None => RuleSet::new(),
        };
        rules.extend(self.user.build_rules()?);
        Ok(rules)
    }

    pub fn condition_paths(&self) -> Result<ConditionPaths> {
        let mut paths = ConditionPaths::builtin()?;
        if let Some(builtin) = &self.builtin {
            builtin.apply_paths(&mut paths)?;
        }
        self.user.apply_paths(&mut paths)?;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ConditionFilter, Mode};
    use crate::condition::ConditionKey;
    use crate::legacy::LegacyRuleSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
resources:
  - name: deployments
    resourceGroup: apps
    skipIfTrue:
      - type: Progressing
    skipIfFalse:
      - type: ReplicaFailure
        reason: "Quota*"
  - name: nodes
    group: core
    skipIfFalse:
      - type: NetworkUnavailable
"#;

    fn disagreement(group: &str, status: &str) -> Disagreement {
        Disagreement {
            group: group.to_string(),
            resource: "pods".to_string(),
            condition_type: "Initialized".to_string(),
            status: status.to_string(),
            reason: "PodCompleted".to_string(),
            message: "done".to_string(),
            authoritative: "legacy",
            authoritative_skips: true,
            other: "config",
        }
    }

    #[test]
    fn test_parse_and_build_rules() {
        let config = RuleConfig::from_yaml(SAMPLE, "sample").unwrap();
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources[1].resource_group, "core");

        let rules = config.build_rules().unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.should_skip(&ConditionKey::new(
            "apps", "deployments", "Progressing", "True", "NewReplicaSetAvailable", "ok"
        )));
        assert!(!rules.should_skip(&ConditionKey::new(
            "apps", "deployments", "Progressing", "False", "", ""
        )));
        assert!(rules.should_skip(&ConditionKey::new(
            "apps", "deployments", "ReplicaFailure", "False", "QuotaExceeded", "x"
        )));
        assert!(rules.should_skip(&ConditionKey::new(
            "", "nodes", "NetworkUnavailable", "False", "", ""
        )));
    }

    #[test]
    fn test_status_on_matcher_is_rejected() {
        let yaml = r#"
resources:
  - name: pods
    resourceGroup: core
    skipIfTrue:
      - type: Ready
        status: "True"
"#;
        let err = RuleConfig::from_yaml(yaml, "bad").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert!(err.to_string().contains("must not set status"));
    }

    #[test]
    fn test_missing_group_is_rejected() {
        let yaml = "resources:\n  - name: pods\n    skipIfTrue:\n      - type: Ready\n";
        let err = RuleConfig::from_yaml(yaml, "bad").unwrap_err();
        assert!(err.to_string().contains("missing resourceGroup"));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let yaml = "resources:\n  - name: pods\n    resourceGroup: core\n    skipIfTrue:\n      - reason: X\n";
        let err = RuleConfig::from_yaml(yaml, "bad").unwrap_err();
        assert!(err.to_string().contains("missing type"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let yaml = "resources:\n  - name: pods\n    resourceGroup: core\n    skipIfUnknown: []\n";
        let err = RuleConfig::from_yaml(yaml, "bad.yaml").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builtin_config_parses() {
        let builtin = RuleConfig::builtin().unwrap();
        let rules = builtin.build_rules().unwrap();
        assert!(!rules.is_empty());
        assert!(rules.should_skip(&ConditionKey::new(
            "apps", "deployments", "Available", "True", "MinimumReplicasAvailable", ""
        )));
        assert!(rules.should_skip(&ConditionKey::new(
            "cluster.x-k8s.io", "machinesets", "Ready", "False", "Deleted @ Machine/m-1", ""
        )));
        assert!(!rules.should_skip(&ConditionKey::new(
            "apps", "deployments", "Available", "False", "", ""
        )));
    }

    #[test]
    fn test_builtin_config_agrees_with_legacy_tables() {
        let filter = ConditionFilter::new(
            Mode::LegacyDecidesCompareConfig,
            Arc::new(LegacyRuleSet::builtin().unwrap()),
            Arc::new(RuleConfig::builtin().unwrap().build_rules().unwrap()),
        );
        let samples = [
            ("apps", "deployments", "Available", "True", "", ""),
            ("", "nodes", "MemoryPressure", "False", "", ""),
            ("", "nodes", "KernelDeadlock", "False", "", ""),
            ("autoscaling", "horizontalpodautoscalers", "ScalingLimited", "False", "", ""),
            ("longhorn.io", "volumes", "TooManySnapshots", "False", "", ""),
            ("example.com", "widgets", "Degraded", "True", "", ""),
        ];
        for (g, r, t, s, reason, msg) in samples {
            let verdict = filter.classify(&ConditionKey::new(g, r, t, s, reason, msg));
            assert_eq!(verdict.disagreement, None, "{r} {t}={s}");
        }
    }

    #[test]
    fn test_builtin_core_rules_stay_in_core_group() {
        let rules = RuleConfig::builtin().unwrap().build_rules().unwrap();
        assert!(rules.should_skip(&ConditionKey::new("", "nodes", "KernelDeadlock", "False", "", "")));
        assert!(!rules.should_skip(&ConditionKey::new(
            "longhorn.io",
            "nodes",
            "KernelDeadlock",
            "False",
            "",
            ""
        )));
    }

    #[test]
    fn test_builtin_condition_paths() {
        let config = EffectiveConfig::new(Some(RuleConfig::builtin().unwrap()), RuleConfig::default());
        let paths = config.condition_paths().unwrap();
        assert_eq!(
            paths.path_for("infrastructure.cluster.x-k8s.io", "hetznerbaremetalhosts"),
            ["spec", "status", "conditions"]
        );
    }

    #[test]
    fn test_user_condition_paths_override() {
        let user = RuleConfig::from_yaml(
            "conditionPaths:\n  - resource: widgets\n    group: example.com\n    path: state.conditions\n",
            "user",
        )
        .unwrap();
        let paths = EffectiveConfig::new(None, user).condition_paths().unwrap();
        assert_eq!(paths.path_for("example.com", "widgets"), ["state", "conditions"]);
        assert_eq!(paths.path_for("apps", "deployments"), ["status", "conditions"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");
        let config = RuleConfig::load_from(&path).unwrap();
        assert!(config.resources.is_empty());
        assert_eq!(config.path(), Some(path.as_path()));
    }

    #[test]
    fn test_discover_walks_upwards() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_REL_PATH);
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(&config_path, SAMPLE).unwrap();

        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = RuleConfig::discover(&nested).unwrap();
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_discover_nothing() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("x");
        std::fs::create_dir_all(&nested).unwrap();
        // Parents of the temp dir may hold a config; only check the nested dir has none.
        if let Some(found) = RuleConfig::discover(&nested).unwrap() {
            assert!(!found.starts_with(dir.path()));
        }
    }

    #[test]
    fn test_add_legacy_ignore_and_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".config/check-conditions/check-conditions.yaml");
        let mut config = RuleConfig::load_from(&path).unwrap();

        assert!(config.add_legacy_ignore(&disagreement("", "True")));
        assert!(!config.add_legacy_ignore(&disagreement("", "True")));
        config.save().unwrap();

        let reloaded = RuleConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.resources.len(), 1);
        let entry = &reloaded.resources[0];
        assert_eq!(entry.resource_group, "core");
        assert_eq!(entry.name, "pods");
        assert_eq!(
            entry.skip_if_true,
            vec![ConditionMatcher {
                reason: "PodCompleted".to_string(),
                message: "done".to_string(),
                ..ConditionMatcher::new("Initialized")
            }]
        );
        assert!(entry.skip_if_false.is_empty());

        let rules = reloaded.build_rules().unwrap();
        assert!(rules.should_skip(&ConditionKey::new(
            "", "pods", "Initialized", "True", "PodCompleted", "done"
        )));
        assert!(!rules.should_skip(&ConditionKey::new(
            "", "pods", "Initialized", "True", "Other", "anything"
        )));
    }

    #[test]
    fn test_add_legacy_ignore_keeps_reason_apart() {
        let mut config = RuleConfig::default();
        let mut unavailable = disagreement("longhorn.io", "True");
        unavailable.resource = "backuptargets".to_string();
        unavailable.condition_type = "Unavailable".to_string();
        unavailable.reason = "Unavailable".to_string();
        unavailable.message = "backup target URL is empty".to_string();

        let mut other_reason = unavailable.clone();
        other_reason.reason = "Unreachable".to_string();

        assert!(config.add_legacy_ignore(&unavailable));
        assert!(config.add_legacy_ignore(&other_reason));
        assert!(!config.add_legacy_ignore(&unavailable));
        assert_eq!(config.resources[0].skip_if_true.len(), 2);

        let rules = config.build_rules().unwrap();
        let key = |reason, message| {
            ConditionKey::new("longhorn.io", "backuptargets", "Unavailable", "True", reason, message)
        };
        assert!(rules.should_skip(&key("Unavailable", "backup target URL is empty")));
        assert!(rules.should_skip(&key("Unreachable", "backup target URL is empty")));
        assert!(!rules.should_skip(&key("Unavailable", "connection refused")));
        assert!(!rules.should_skip(&key("Timeout", "backup target URL is empty")));
    }

    #[test]
    fn test_add_legacy_ignore_without_reason_matches_any_reason() {
        let mut config = RuleConfig::default();
        let mut bare = disagreement("", "True");
        bare.reason = String::new();
        bare.message = String::new();
        assert!(config.add_legacy_ignore(&bare));

        let rules = config.build_rules().unwrap();
        assert!(rules.should_skip(&ConditionKey::new(
            "", "pods", "Initialized", "True", "Other", "anything"
        )));
    }

    #[test]
    fn test_saved_format() {
        let mut config = RuleConfig::default();
        config.add_legacy_ignore(&disagreement("", "True"));
        insta::assert_snapshot!(serde_yaml::to_string(&config).unwrap(), @r"
        resources:
        - name: pods
          resourceGroup: core
          skipIfTrue:
          - type: Initialized
            reason: PodCompleted
            message: done
        ");
    }

    #[test]
    fn test_add_legacy_ignore_unknown_status_goes_to_both_lists() {
        let mut config = RuleConfig::default();
        assert!(config.add_legacy_ignore(&disagreement("apps", "Unknown")));
        let entry = &config.resources[0];
        assert_eq!(entry.resource_group, "apps");
        assert_eq!(entry.skip_if_true.len(), 1);
        assert_eq!(entry.skip_if_false.len(), 1);
    }

    #[test]
    fn test_save_without_path() {
        let err = RuleConfig::default().save().unwrap_err();
        assert!(matches!(err, CoreError::ConfigPathNotSet));
    }

    #[test]
    fn test_effective_config_skip_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let with = EffectiveConfig::load(Some(&path), dir.path(), false).unwrap();
        let without = EffectiveConfig::load(Some(&path), dir.path(), true).unwrap();
        assert_eq!(without.rule_set().unwrap().len(), 3);
        assert!(with.rule_set().unwrap().len() > 3);
        assert_eq!(with.user().path(), Some(path.as_path()));
    }
}
