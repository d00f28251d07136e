//! Legacy heuristic tables
//!
//! The legacy engine judges a condition by the shape of its type name:
//! types ending in `Ready`, `Healthy`, `Available`... are fine when `True`,
//! types ending in `Pressure`, `Unavailable`... are fine when `False`.
//! Per-resource exception lists take precedence over the generic lists, and a
//! list of ignore-line patterns silences known-noisy third-party controllers.

use regex::Regex;
use std::collections::HashMap;

use crate::condition::ConditionKey;
use crate::error::{CoreError, Result};

const POSITIVE_SUFFIXES: &[&str] = &[
    "Applied",
    "Approved",
    "Available",
    "Built",
    "Complete",
    "Created",
    "Downloaded",
    "Established",
    "Healthy",
    "Initialized",
    "Installed",
    "LoadBalancerAttached",
    "NamesAccepted",
    "Passed",
    "PodScheduled",
    "Progressing",
    "Provisioned",
    "Reachable",
    "Ready",
    "Reconciled",
    "RemediationAllowed",
    "Resized",
    "Succeeded",
    "Synced",
    "UpToDate",
    "ProviderUpgraded",
];

const POSITIVE_PREFIXES: &[&str] = &["Created"];

const NEGATIVE_SUFFIXES: &[&str] = &["Unavailable", "Pressure", "Dangling", "Unhealthy"];

/// `(prefix, suffix)` pairs, e.g. `FrequentKubeletRestart`
const NEGATIVE_PREFIX_SUFFIX: &[(&str, &str)] = &[("Frequent", "Restart")];

const POSITIVE_BY_RESOURCE: &[(&str, &[&str])] = &[
    ("extensionconfigs", &["Discovered"]),
    ("hetznerclusters", &["ControlPlaneEndpointSet"]),
    ("hetznerbaremetalmachines", &["AssociateBMHCondition"]),
    ("horizontalpodautoscalers", &["AbleToScale", "ScalingActive"]),
    ("hetznerbaremetalhosts", &["RootDeviceHintsValidated"]),
    ("clusters", &["ContinuousArchiving"]),
    (
        "clusteraddons",
        &["ClusterAddonConfigValidated", "ClusterAddonHelmChartUntarred"],
    ),
    ("engineimages", &["ready"]),
    ("nodes", &["Schedulable", "MountPropagation"]),
];

const NEGATIVE_BY_RESOURCE: &[(&str, &[&str])] = &[
    (
        "nodes",
        &[
            "KernelDeadlock",
            "ReadonlyFilesystem",
            "FrequentUnregisterNetDevice",
            "NTPProblem",
        ],
    ),
    ("horizontalpodautoscalers", &["ScalingLimited"]),
];

/// Patterns matched against `<resource> <type>=<status> <reason> "<message>"`.
///
/// To add one, take a reported line and drop the namespace, the object name and the age.
const IGNORE_LINES: &[&str] = &[
    "machinesets MachinesReady=False Deleted @.*",
    "machinesets Ready=False Deleted @.*",
    // Longhorn
    r#"backuptargets Unavailable=True Unavailable "backup target URL is empty""#,
    "engines InstanceCreation=True",
    "engines FilesystemReadOnly=False",
    "replicas InstanceCreation=True",
    "replicas FilesystemReadOnly=False",
    "replicas WaitForBackingImage=False",
    "volumes WaitForBackingImage=False",
    "volumes TooManySnapshots=False",
    "volumes Scheduled=True",
    "volumes Restore=False",
];

/// Immutable legacy rule tables
#[derive(Debug, Clone, Default)]
pub struct LegacyRuleSet {
    positive_suffixes: Vec<String>,
    positive_prefixes: Vec<String>,
    positive_by_resource: HashMap<String, Vec<String>>,
    negative_suffixes: Vec<String>,
    negative_prefix_suffix: Vec<(String, String)>,
    negative_by_resource: HashMap<String, Vec<String>>,
    ignore_lines: Vec<Regex>,
}

impl LegacyRuleSet {
    /// The tables shipped with the tool
    pub fn builtin() -> Result<Self> {
        let mut builder = LegacyRuleSetBuilder::default()
            .positive_suffixes(POSITIVE_SUFFIXES.iter().copied())
            .positive_prefixes(POSITIVE_PREFIXES.iter().copied())
            .negative_suffixes(NEGATIVE_SUFFIXES.iter().copied());

        for (prefix, suffix) in NEGATIVE_PREFIX_SUFFIX {
            builder = builder.negative_prefix_suffix(prefix, suffix);
        }
        for (resource, types) in POSITIVE_BY_RESOURCE {
            builder = builder.positive_for_resource(resource, types.iter().copied());
        }
        for (resource, types) in NEGATIVE_BY_RESOURCE {
            builder = builder.negative_for_resource(resource, types.iter().copied());
        }
        for line in IGNORE_LINES {
            builder = builder.ignore_line(line);
        }

        builder.build()
    }

    pub fn builder() -> LegacyRuleSetBuilder {
        LegacyRuleSetBuilder::default()
    }

    /// Whether `True` is the healthy value of this condition type
    pub fn has_positive_meaning(&self, resource: &str, condition_type: &str) -> bool {
        if let Some(types) = self.positive_by_resource.get(resource)
            && types.iter().any(|t| t == condition_type)
        {
            return true;
        }
        self.positive_suffixes
            .iter()
            .any(|s| condition_type.ends_with(s.as_str()))
            || self
                .positive_prefixes
                .iter()
                .any(|p| condition_type.starts_with(p.as_str()))
    }

    /// Whether `False` is the healthy value of this condition type
    pub fn has_negative_meaning(&self, resource: &str, condition_type: &str) -> bool {
        if let Some(types) = self.negative_by_resource.get(resource)
            && types.iter().any(|t| t == condition_type)
        {
            return true;
        }
        self.negative_suffixes
            .iter()
            .any(|s| condition_type.ends_with(s.as_str()))
            || self.negative_prefix_suffix.iter().any(|(p, s)| {
                condition_type.len() >= p.len() + s.len()
                    && condition_type.starts_with(p.as_str())
                    && condition_type.ends_with(s.as_str())
            })
    }

    /// Whether a curated ignore-line pattern matches this condition
    pub fn ignores_line(&self, key: &ConditionKey<'_>) -> bool {
        if self.ignore_lines.is_empty() {
            return false;
        }
        let line = key.match_line();
        self.ignore_lines.iter().any(|r| r.is_match(&line))
    }

    /// Legacy verdict for steps 2 to 4 of the pipeline
    pub fn should_skip(&self, key: &ConditionKey<'_>) -> bool {
        let by_meaning = match key.status {
            "True" => self.has_positive_meaning(key.resource, key.condition_type),
            "False" => self.has_negative_meaning(key.resource, key.condition_type),
            _ => false,
        };
        by_meaning || self.ignores_line(key)
    }
}

/// Builder for custom legacy tables, mostly useful in tests
#[derive(Debug, Default)]
pub struct LegacyRuleSetBuilder {
    rules: LegacyRuleSet,
    ignore_patterns: Vec<String>,
}

impl LegacyRuleSetBuilder {
    pub fn positive_suffixes<'a>(mut self, suffixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.rules
            .positive_suffixes
            .extend(suffixes.into_iter().map(String::from));
        self
    }

    pub fn positive_prefixes<'a>(mut self, prefixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.rules
            .positive_prefixes
            .extend(prefixes.into_iter().map(String::from));
        self
    }

    pub fn negative_suffixes<'a>(mut self, suffixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.rules
            .negative_suffixes
            .extend(suffixes.into_iter().map(String::from));
        self
    }

    pub fn negative_prefix_suffix(mut self, prefix: &str, suffix: &str) -> Self {
        self.rules
            .negative_prefix_suffix
            .push((prefix.to_string(), suffix.to_string()));
        self
    }

    pub fn positive_for_resource<'a>(
        mut self,
        resource: &str,
        types: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.rules
            .positive_by_resource
            .entry(resource.to_string())
            .or_default()
            .extend(types.into_iter().map(String::from));
        self
    }

    pub fn negative_for_resource<'a>(
        mut self,
        resource: &str,
        types: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.rules
            .negative_by_resource
            .entry(resource.to_string())
            .or_default()
            .extend(types.into_iter().map(String::from));
        self
    }

    pub fn ignore_line(mut self, pattern: &str) -> Self {
        self.ignore_patterns.push(pattern.to_string());
        self
    }

    pub fn build(mut self) -> Result<LegacyRuleSet> {
        for pattern in self.ignore_patterns {
            let regex = Regex::new(&pattern).map_err(|source| CoreError::InvalidPattern {
                field: "ignore line",
                pattern: pattern.clone(),
                source,
            })?;
            self.rules.ignore_lines.push(regex);
        }
        Ok(self.rules)
    }
}
