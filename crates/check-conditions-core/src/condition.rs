//! Condition entries as reported by cluster objects
//!
//! A condition is one element of an object's `status.conditions` array:
//!
//! ```yaml
//! - type: Ready
//!   status: "False"
//!   reason: CrashLoopBackOff
//!   message: back-off restarting failed container
//!   lastTransitionTime: "2024-05-01T10:00:00Z"
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Status of a condition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    /// Anything else a controller put into the status field
    Other(String),
}

impl ConditionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "True" => Self::True,
            "False" => Self::False,
            "Unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single condition extracted from an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEntry {
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Why a condition entry could not be used
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedCondition {
    #[error("conditions field is not a list")]
    NotAList,

    #[error("condition is not an object")]
    NotAnObject,

    #[error("condition field '{0}' is missing")]
    MissingField(&'static str),

    #[error("condition field '{0}' is not a string")]
    NotAString(&'static str),
}

impl ConditionEntry {
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_last_transition_time(mut self, time: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(time);
        self
    }

    /// Parse one element of a conditions array.
    ///
    /// `type` and `status` are required; `reason` and `message` default to empty.
    /// An unparseable `lastTransitionTime` is treated as absent.
    pub fn from_value(value: &Value) -> Result<Self, MalformedCondition> {
        let map = value.as_object().ok_or(MalformedCondition::NotAnObject)?;

        let required = |field: &'static str| -> Result<&str, MalformedCondition> {
            map.get(field)
                .ok_or(MalformedCondition::MissingField(field))?
                .as_str()
                .ok_or(MalformedCondition::NotAString(field))
        };
        let optional = |field: &str| -> String {
            map.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let condition_type = required("type")?.to_string();
        let status = ConditionStatus::parse(required("status")?);

        let last_transition_time = map
            .get("lastTransitionTime")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Self {
            condition_type,
            status,
            reason: optional("reason"),
            message: optional("message"),
            last_transition_time,
        })
    }

    /// Borrow the classification tuple of this entry for a given resource type
    pub fn key<'a>(&'a self, group: &'a str, resource: &'a str) -> ConditionKey<'a> {
        ConditionKey {
            group,
            resource,
            condition_type: &self.condition_type,
            status: self.status.as_str(),
            reason: &self.reason,
            message: &self.message,
        }
    }
}

/// The six values a classification decision depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionKey<'a> {
    pub group: &'a str,
    pub resource: &'a str,
    pub condition_type: &'a str,
    pub status: &'a str,
    pub reason: &'a str,
    pub message: &'a str,
}

impl<'a> ConditionKey<'a> {
    pub fn new(
        group: &'a str,
        resource: &'a str,
        condition_type: &'a str,
        status: &'a str,
        reason: &'a str,
        message: &'a str,
    ) -> Self {
        Self {
            group,
            resource,
            condition_type,
            status,
            reason,
            message,
        }
    }

    /// The line used for matching against ignore-line patterns:
    /// `<resource> <type>=<status> <reason> "<message>"`
    pub fn match_line(&self) -> String {
        format!(
            "{} {}={} {} {}",
            self.resource,
            self.condition_type,
            self.status,
            self.reason,
            quote(self.message)
        )
    }
}

/// Double-quote a string, escaping quotes, backslashes and control characters
pub fn quote(s: &str) -> String {
    format!("{:?}", s)
}
