//! Pattern rules for suppressing conditions
//!
//! A rule is a tuple of six patterns (group, resource, type, status, reason,
//! message). Each pattern is a literal where `*` matches any run of characters;
//! matching is anchored to the whole value. A condition is suppressed when any
//! rule matches all six of its values.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;

use crate::condition::ConditionKey;
use crate::error::{CoreError, Result};

/// Wildcard that matches any value
pub const WILDCARD: &str = "*";

/// A single compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    /// `None` for a bare `*`
    regex: Option<Regex>,
}

impl Pattern {
    /// Compile a wildcard pattern. An empty pattern only matches the empty value,
    /// so the core group (`""`) is not mistaken for any group.
    pub fn compile(field: &'static str, raw: &str) -> Result<Self> {
        if raw == WILDCARD {
            return Ok(Self {
                raw: raw.to_string(),
                regex: None,
            });
        }

        let escaped = regex::escape(raw).replace(r"\*", ".*");
        let regex =
            Regex::new(&format!("^{}$", escaped)).map_err(|source| CoreError::InvalidPattern {
                field,
                pattern: raw.to_string(),
                source,
            })?;

        Ok(Self {
            raw: raw.to_string(),
            regex: Some(regex),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        match &self.regex {
            None => true,
            Some(regex) => regex.is_match(value),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One suppression rule
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub group: Pattern,
    pub resource: Pattern,
    pub condition_type: Pattern,
    pub status: Pattern,
    pub reason: Pattern,
    pub message: Pattern,
}

impl ClassificationRule {
    pub fn new(
        group: &str,
        resource: &str,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) -> Result<Self> {
        Ok(Self {
            group: Pattern::compile("group", &canonical_group(group))?,
            resource: Pattern::compile("resource", resource)?,
            condition_type: Pattern::compile("type", condition_type)?,
            status: Pattern::compile("status", status)?,
            reason: Pattern::compile("reason", reason)?,
            message: Pattern::compile("message", message)?,
        })
    }

    pub fn matches(&self, key: &ConditionKey<'_>) -> bool {
        self.group.matches(key.group)
            && self.resource.matches(key.resource)
            && self.condition_type.matches(key.condition_type)
            && self.status.matches(key.status)
            && self.reason.matches(key.reason)
            && self.message.matches(key.message)
    }

    fn index_key(&self) -> [String; 6] {
        [
            self.group.as_str().to_string(),
            self.resource.as_str().to_string(),
            self.condition_type.as_str().to_string(),
            self.status.as_str().to_string(),
            self.reason.as_str().to_string(),
            self.message.as_str().to_string(),
        ]
    }
}

impl fmt::Display for ClassificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group={} resource={} type={} status={} reason={} message={}",
            self.group,
            self.resource,
            self.condition_type,
            self.status,
            self.reason,
            self.message
        )
    }
}

/// "core" is how users spell the empty core API group
pub fn canonical_group(group: &str) -> String {
    let group = group.trim();
    if group.eq_ignore_ascii_case("core") {
        String::new()
    } else {
        group.to_string()
    }
}

/// Ordered collection of suppression rules, deduplicated by their raw patterns
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: IndexMap<[String; 6], ClassificationRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and insert a rule.
    ///
    /// Returns `false` when an identical rule was already present.
    pub fn add_rule(
        &mut self,
        group: &str,
        resource: &str,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) -> Result<bool> {
        let rule = ClassificationRule::new(group, resource, condition_type, status, reason, message)?;
        Ok(self.insert(rule))
    }

    pub fn insert(&mut self, rule: ClassificationRule) -> bool {
        let key = rule.index_key();
        if self.rules.contains_key(&key) {
            return false;
        }
        self.rules.insert(key, rule);
        true
    }

    /// Append all rules of `other` that are not yet present
    pub fn extend(&mut self, other: RuleSet) {
        for (key, rule) in other.rules {
            self.rules.entry(key).or_insert(rule);
        }
    }

    /// The first rule matching the condition, if any
    pub fn find_match(&self, key: &ConditionKey<'_>) -> Option<&ClassificationRule> {
        self.rules.values().find(|rule| rule.matches(key))
    }

    pub fn should_skip(&self, key: &ConditionKey<'_>) -> bool {
        self.find_match(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.values()
    }
}
