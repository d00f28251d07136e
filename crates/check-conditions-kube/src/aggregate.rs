//! Cycle-wide aggregation
//!
//! Job outputs arrive from the workers over a channel and are merged here by
//! a single owner, which also writes report lines to the sink as they arrive.

use chrono::Utc;
use regex::Regex;
use std::io;
use std::time::Duration;

use check_conditions_core::Disagreement;

use crate::scan::JobOutput;
use crate::sink::ReportSink;

/// Counters for one scan cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounters {
    pub resource_types_scanned: u64,
    pub objects_scanned: u64,
    pub conditions_scanned: u64,
    pub reported_any: bool,
}

impl CycleCounters {
    pub fn add(&mut self, output: &JobOutput) {
        self.resource_types_scanned += 1;
        self.objects_scanned += output.objects_scanned;
        self.conditions_scanned += output.conditions_scanned;
        if !output.lines.is_empty() {
            self.reported_any = true;
        }
    }
}

/// Everything one cycle produced
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub counters: CycleCounters,
    /// Rendered report lines, in arrival order
    pub lines: Vec<String>,
    pub disagreements: Vec<Disagreement>,
    /// Per-type list errors
    pub errors: Vec<String>,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CycleReport {
    /// Merge one job output and write its lines and diagnostics to `sink`
    pub fn absorb(&mut self, output: JobOutput, sink: &mut dyn ReportSink) -> io::Result<()> {
        self.counters.add(&output);

        let now = Utc::now();
        for line in &output.lines {
            let text = line.render(now);
            sink.line(&text)?;
            self.lines.push(text);
        }
        for disagreement in output.disagreements {
            sink.diagnostic(&disagreement.to_string())?;
            self.disagreements.push(disagreement);
        }
        if let Some(error) = output.error {
            self.errors.push(error);
        }
        Ok(())
    }

    /// Whether any reported line matches `regex`
    pub fn any_line_matches(&self, regex: &Regex) -> bool {
        self.lines.iter().any(|line| regex.is_match(line))
    }

    pub fn summary(&self) -> String {
        format!(
            "Checked {} conditions of {} resources of {} types. Duration: {}",
            self.counters.conditions_scanned,
            self.counters.objects_scanned,
            self.counters.resource_types_scanned,
            format_duration(self.duration)
        )
    }
}

/// Format a duration rounded to milliseconds: `0s`, `190ms`, `1.5s`, `1m2.03s`, `1h0m0s`
pub fn format_duration(duration: Duration) -> String {
    let millis = (duration.as_micros() + 500) / 1000;
    if millis == 0 {
        return "0s".to_string();
    }
    if millis < 1000 {
        return format!("{millis}ms");
    }

    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let fraction = millis % 1000;

    let mut seconds = ((millis / 1000) % 60).to_string();
    if fraction > 0 {
        let digits = format!("{fraction:03}");
        seconds.push('.');
        seconds.push_str(digits.trim_end_matches('0'));
    }

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use check_conditions_core::{ConditionEntry, ConditionStatus, ReportLine, ResourceTypeDescriptor};

    fn output(objects: u64, conditions: u64, lines: usize) -> JobOutput {
        let mut out = JobOutput::new(ResourceTypeDescriptor::new("", "v1", "pods", "Pod", true), 0);
        out.objects_scanned = objects;
        out.conditions_scanned = conditions;
        out.lines = (0..lines)
            .map(|i| ReportLine {
                namespace: "default".to_string(),
                resource: "pods".to_string(),
                object_name: format!("web-{i}"),
                entry: ConditionEntry::new("Degraded", ConditionStatus::True).with_reason("Crash"),
            })
            .collect();
        out
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_micros(400)), "0s");
        assert_eq!(format_duration(Duration::from_millis(190)), "190ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(62_030)), "1m2.03s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
    }

    #[test]
    fn test_counters_merge() {
        let mut counters = CycleCounters::default();
        counters.add(&output(2, 5, 0));
        counters.add(&output(1, 1, 0));
        assert!(!counters.reported_any);
        counters.add(&output(0, 0, 1));
        assert_eq!(counters.resource_types_scanned, 3);
        assert_eq!(counters.objects_scanned, 3);
        assert_eq!(counters.conditions_scanned, 6);
        assert!(counters.reported_any);
    }

    #[test]
    fn test_absorb_writes_lines() {
        let mut report = CycleReport::default();
        let mut sink = MemorySink::new();

        let mut failed = output(0, 0, 0);
        failed.error = Some("listing secrets: forbidden".to_string());

        report.absorb(output(2, 2, 2), &mut sink).unwrap();
        report.absorb(failed, &mut sink).unwrap();

        assert_eq!(sink.lines, report.lines);
        assert_eq!(report.lines.len(), 2);
        assert!(report.lines[0].starts_with("  default pods web-0 Condition Degraded=True Crash"));
        assert_eq!(report.errors, vec!["listing secrets: forbidden".to_string()]);
        assert!(report.any_line_matches(&Regex::new("web-1").unwrap()));
        assert!(!report.any_line_matches(&Regex::new("web-7").unwrap()));
    }

    #[test]
    fn test_summary() {
        let report = CycleReport {
            counters: CycleCounters {
                resource_types_scanned: 1,
                objects_scanned: 3,
                conditions_scanned: 3,
                reported_any: true,
            },
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        insta::assert_snapshot!(report.summary(), @"Checked 3 conditions of 3 resources of 1 types. Duration: 1.5s");
    }
}
