//! Condition classification
//!
//! Every condition goes through a fixed pipeline; the first step that
//! suppresses it wins:
//!
//! 1. Types that toggle both ways without meaning (always skipped)
//! 2. The authoritative classifier, selected by [`Mode`]:
//!    - [`LegacyClassifier`]: positive/negative tables and ignore lines
//!    - [`ConfigClassifier`]: user-editable pattern rules
//! 3. Expected terminal states (completed pods, deleted machines)
//!
//! In the comparison modes both classifiers run for every condition and
//! disagreements are returned alongside the verdict. They never change it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::condition::{ConditionKey, quote};
use crate::legacy::LegacyRuleSet;
use crate::rules::RuleSet;

/// Conditions which can be `True` or `False` and both values are fine
pub const ALWAYS_SKIP_TYPES: &[&str] = &[
    "DisruptionAllowed",
    "LoadBalancerAttachedToNetwork",
    "NetworkAttached",
    // completed pods report "False"
    "PodReadyToStartContainers",
];

const TERMINAL_TYPES: &[&str] = &["Ready", "ContainersReady", "InfrastructureReady", "MachinesReady"];

const TERMINAL_REASONS: &[&str] = &["PodCompleted", "InstanceTerminated", "Deleted"];

pub fn is_always_skipped(condition_type: &str) -> bool {
    ALWAYS_SKIP_TYPES.contains(&condition_type)
}

/// The object was deliberately completed or deleted.
///
/// Cluster API aggregates reasons as `Deleted @ Machine/name`; only the part
/// before `@` is compared.
pub fn is_terminal_state(condition_type: &str, status: &str, reason: &str) -> bool {
    if status != "False" || !TERMINAL_TYPES.contains(&condition_type) {
        return false;
    }
    let reason = reason.split('@').next().unwrap_or_default().trim();
    TERMINAL_REASONS.contains(&reason)
}

/// A strategy deciding whether a condition is expected and can be suppressed
pub trait Classifier: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// `true` if the condition should not be reported
    fn should_skip(&self, key: &ConditionKey<'_>) -> bool;
}

/// Classifier backed by the legacy heuristic tables
#[derive(Debug, Clone)]
pub struct LegacyClassifier {
    rules: Arc<LegacyRuleSet>,
}

impl LegacyClassifier {
    pub fn new(rules: Arc<LegacyRuleSet>) -> Self {
        Self { rules }
    }
}

impl Classifier for LegacyClassifier {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn should_skip(&self, key: &ConditionKey<'_>) -> bool {
        self.rules.should_skip(key)
    }
}

/// Classifier backed by configured pattern rules
#[derive(Debug, Clone)]
pub struct ConfigClassifier {
    rules: Arc<RuleSet>,
}

impl ConfigClassifier {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl Classifier for ConfigClassifier {
    fn name(&self) -> &'static str {
        "config"
    }

    fn should_skip(&self, key: &ConditionKey<'_>) -> bool {
        self.rules.should_skip(key)
    }
}

/// Which classifier decides, and whether the other one is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    OnlyLegacy,
    OnlyConfig,
    LegacyDecidesCompareConfig,
    ConfigDecidesCompareLegacy,
}

impl Mode {
    pub const VARIANTS: &'static [&'static str] = &[
        "only-legacy",
        "only-config",
        "legacy-compare-config",
        "config-compare-legacy",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::OnlyLegacy => "only-legacy",
            Mode::OnlyConfig => "only-config",
            Mode::LegacyDecidesCompareConfig => "legacy-compare-config",
            Mode::ConfigDecidesCompareLegacy => "config-compare-legacy",
        }
    }

    pub fn compares(&self) -> bool {
        matches!(
            self,
            Mode::LegacyDecidesCompareConfig | Mode::ConfigDecidesCompareLegacy
        )
    }

    pub fn config_decides(&self) -> bool {
        matches!(self, Mode::OnlyConfig | Mode::ConfigDecidesCompareLegacy)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "only-legacy" | "only-old" => Ok(Mode::OnlyLegacy),
            "only-config" | "only-new" => Ok(Mode::OnlyConfig),
            "legacy-compare-config" | "old-compare-new" => Ok(Mode::LegacyDecidesCompareConfig),
            "config-compare-legacy" | "new-compare-old" => Ok(Mode::ConfigDecidesCompareLegacy),
            other => Err(format!(
                "invalid mode {:?}: must be one of: {}",
                other,
                Mode::VARIANTS.join(", ")
            )),
        }
    }
}

/// Two classifiers came to different conclusions about one condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disagreement {
    pub group: String,
    pub resource: String,
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub authoritative: &'static str,
    pub authoritative_skips: bool,
    pub other: &'static str,
}

impl Disagreement {
    fn new(
        key: &ConditionKey<'_>,
        authoritative: &dyn Classifier,
        authoritative_skips: bool,
        other: &dyn Classifier,
    ) -> Self {
        Self {
            group: key.group.to_string(),
            resource: key.resource.to_string(),
            condition_type: key.condition_type.to_string(),
            status: key.status.to_string(),
            reason: key.reason.to_string(),
            message: key.message.to_string(),
            authoritative: authoritative.name(),
            authoritative_skips,
            other: other.name(),
        }
    }

    /// Whether the legacy engine is the one that suppresses this condition
    pub fn legacy_skips(&self) -> bool {
        (self.authoritative == "legacy") == self.authoritative_skips
    }

    pub fn key(&self) -> ConditionKey<'_> {
        ConditionKey::new(
            &self.group,
            &self.resource,
            &self.condition_type,
            &self.status,
            &self.reason,
            &self.message,
        )
    }
}

impl fmt::Display for Disagreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = |skips: bool| if skips { "skip" } else { "report" };
        write!(
            f,
            "WARNING: {} and {} disagree on group={} resource={} type={} status={} reason={} message={}: {} would {}, {} would {}",
            self.authoritative,
            self.other,
            self.group,
            self.resource,
            self.condition_type,
            self.status,
            self.reason,
            quote(&self.message),
            self.authoritative,
            verb(self.authoritative_skips),
            self.other,
            verb(!self.authoritative_skips),
        )
    }
}

/// Result of classifying one condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub suppressed: bool,
    pub disagreement: Option<Disagreement>,
}

/// The full per-condition decision pipeline
#[derive(Clone)]
pub struct ConditionFilter {
    mode: Mode,
    legacy: Arc<dyn Classifier>,
    config: Arc<dyn Classifier>,
}

impl fmt::Debug for ConditionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionFilter")
            .field("mode", &self.mode)
            .field("legacy", &self.legacy.name())
            .field("config", &self.config.name())
            .finish()
    }
}

impl ConditionFilter {
    pub fn new(mode: Mode, legacy: Arc<LegacyRuleSet>, config: Arc<RuleSet>) -> Self {
        Self::with_classifiers(
            mode,
            Arc::new(LegacyClassifier::new(legacy)),
            Arc::new(ConfigClassifier::new(config)),
        )
    }

    pub fn with_classifiers(
        mode: Mode,
        legacy: Arc<dyn Classifier>,
        config: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            mode,
            legacy,
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Same filter with a different config rule set
    pub fn with_config(&self, config: Arc<RuleSet>) -> Self {
        Self {
            mode: self.mode,
            legacy: self.legacy.clone(),
            config: Arc::new(ConfigClassifier::new(config)),
        }
    }

    fn authoritative(&self) -> (&dyn Classifier, &dyn Classifier) {
        if self.mode.config_decides() {
            (self.config.as_ref(), self.legacy.as_ref())
        } else {
            (self.legacy.as_ref(), self.config.as_ref())
        }
    }

    /// Classify one condition
    pub fn classify(&self, key: &ConditionKey<'_>) -> Verdict {
        if is_always_skipped(key.condition_type) {
            return Verdict {
                suppressed: true,
                disagreement: None,
            };
        }

        let (deciding, other) = self.authoritative();
        let skip = deciding.should_skip(key);

        let disagreement = if self.mode.compares() && other.should_skip(key) != skip {
            Some(Disagreement::new(key, deciding, skip, other))
        } else {
            None
        };

        let suppressed = skip || is_terminal_state(key.condition_type, key.status, key.reason);
        Verdict {
            suppressed,
            disagreement,
        }
    }

    /// Shorthand for callers which only need the decision
    pub fn should_skip(&self, key: &ConditionKey<'_>) -> bool {
        self.classify(key).suppressed
    }
}
