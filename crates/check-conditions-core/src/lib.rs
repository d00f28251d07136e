//! check-conditions core - condition model and classification engines
//!
//! This crate provides everything that does not talk to a cluster:
//! - `ConditionEntry`: one element of an object's conditions array
//! - `LegacyRuleSet`: the suffix/prefix heuristic tables
//! - `RuleSet`: wildcard pattern rules loaded from config files
//! - `ConditionFilter`: the per-condition decision pipeline and its modes
//! - `evaluate_object`: classification plus Ready merging for one object
//! - `RuleConfig`: the YAML rule file, its discovery and migration assist

pub mod classifier;
pub mod condition;
pub mod config;
pub mod error;
pub mod legacy;
pub mod object;
pub mod paths;
pub mod report;
pub mod rules;

pub use classifier::{
    Classifier, ConditionFilter, ConfigClassifier, Disagreement, LegacyClassifier, Mode, Verdict,
};
pub use condition::{ConditionEntry, ConditionKey, ConditionStatus, MalformedCondition};
pub use config::{ConditionMatcher, EffectiveConfig, ResourceConfig, RuleConfig};
pub use error::{CoreError, Result};
pub use legacy::LegacyRuleSet;
pub use object::{GenericObject, ResourceTypeDescriptor};
pub use paths::ConditionPaths;
pub use report::{ObjectReport, ReportLine, evaluate_object, format_age};
pub use rules::{ClassificationRule, Pattern, RuleSet};
