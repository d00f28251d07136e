//! Evaluation of a single object and formatting of reported lines
//!
//! Output format, one line per reported condition:
//!
//! ```text
//!   <namespace> <resource> <name> Condition <Type>=<Status> <Reason> "<Message>" (<age>)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fmt;

use crate::classifier::{ConditionFilter, Disagreement};
use crate::condition::{ConditionEntry, MalformedCondition, quote};
use crate::object::{GenericObject, ResourceTypeDescriptor};
use crate::paths::{ConditionPaths, lookup};

const READY: &str = "Ready";

/// A condition that survived classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub namespace: String,
    pub resource: String,
    pub object_name: String,
    pub entry: ConditionEntry,
}

impl ReportLine {
    /// Render the line with the age relative to `now`
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let age = self
            .entry
            .last_transition_time
            .map(|t| format_age(now.signed_duration_since(t)))
            .unwrap_or_default();
        format!(
            "  {} {} {} Condition {}={} {} {} ({})",
            self.namespace,
            self.resource,
            self.object_name,
            self.entry.condition_type,
            self.entry.status,
            self.entry.reason,
            quote(&self.entry.message),
            age
        )
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Utc::now()))
    }
}

/// Format a duration rounded to whole seconds: `1h2m3s`, `5m0s`, `42s`, `0s`
pub fn format_age(age: Duration) -> String {
    let millis = age.num_milliseconds();
    let negative = millis < 0;
    let total = (millis.unsigned_abs() + 500) / 1000;

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let sign = if negative && total > 0 { "-" } else { "" };
    if hours > 0 {
        format!("{sign}{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{sign}{minutes}m{seconds}s")
    } else {
        format!("{sign}{seconds}s")
    }
}

/// Everything learned from one object
#[derive(Debug, Clone, Default)]
pub struct ObjectReport {
    pub conditions_scanned: u64,
    pub lines: Vec<ReportLine>,
    pub disagreements: Vec<Disagreement>,
    pub malformed: Vec<MalformedCondition>,
}

/// Extract, classify and merge the conditions of one object
pub fn evaluate_object(
    descriptor: &ResourceTypeDescriptor,
    object: &GenericObject,
    filter: &ConditionFilter,
    paths: &ConditionPaths,
) -> ObjectReport {
    let mut report = ObjectReport::default();

    let path = paths.path_for(&descriptor.group, &descriptor.name);
    let items = match lookup(&object.data, path) {
        None | Some(Value::Null) => return report,
        Some(Value::Array(items)) => items,
        Some(_) => {
            report.malformed.push(MalformedCondition::NotAList);
            return report;
        }
    };

    let mut surviving = Vec::new();
    for item in items {
        let entry = match ConditionEntry::from_value(item) {
            Ok(entry) => entry,
            Err(e) => {
                report.malformed.push(e);
                continue;
            }
        };
        report.conditions_scanned += 1;

        let verdict = filter.classify(&entry.key(&descriptor.group, &descriptor.name));
        if let Some(d) = verdict.disagreement {
            report.disagreements.push(d);
        }
        if !verdict.suppressed {
            surviving.push(entry);
        }
    }

    report.lines = merge_ready(surviving)
        .into_iter()
        .map(|entry| ReportLine {
            namespace: object.namespace.clone(),
            resource: descriptor.name.clone(),
            object_name: object.name.clone(),
            entry,
        })
        .collect();
    report
}

/// Drop the summary `Ready` condition when another surviving condition of the
/// same object carries the same status, reason and message.
pub fn merge_ready(entries: Vec<ConditionEntry>) -> Vec<ConditionEntry> {
    let Some(ready) = entries.iter().find(|e| e.condition_type == READY) else {
        return entries;
    };

    let duplicated = entries.iter().any(|e| {
        e.condition_type != READY
            && e.status == ready.status
            && e.reason == ready.reason
            && e.message == ready.message
    });
    if !duplicated {
        return entries;
    }

    entries
        .into_iter()
        .filter(|e| e.condition_type != READY)
        .collect()
}
