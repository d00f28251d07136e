//! Poll control
//!
//! Repeats scan cycles under one of four strategies:
//!
//! | Strategy     | Stops when                          | Outcome                 |
//! |--------------|-------------------------------------|-------------------------|
//! | `SingleRun`  | after the first cycle               | `Clean` or `Unhealthy`  |
//! | `RunForever` | never                               |                         |
//! | `WaitFor`    | a reported line matches the regex   | `ConditionFound`        |
//! | `While`      | no reported line matches the regex  | `Clean`                 |

use chrono::Local;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use check_conditions_core::condition::quote;
use check_conditions_core::{
    ConditionFilter, ConditionPaths, Disagreement, EffectiveConfig, RuleSet, format_age,
};

use crate::aggregate::CycleReport;
use crate::error::{KubeError, Result};
use crate::scan::Scanner;
use crate::sink::ReportSink;

/// Default pause between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// Runs lasting longer than this print their total duration when stopping
const REPORT_DURATION_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum PollStrategy {
    SingleRun,
    RunForever,
    /// Poll until a reported line matches
    WaitFor(Regex),
    /// Poll as long as a reported line matches
    While(Regex),
}

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing (matching) was reported
    Clean,
    /// A single run reported at least one line
    Unhealthy,
    /// The awaited line showed up
    ConditionFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stop(Outcome),
    Continue,
    /// The cycle timed out and its report cannot decide the outcome
    Incomplete,
}

/// Decide what to do after a cycle.
///
/// A timed-out cycle only proves what it reported: a matching line still ends
/// `WaitFor`, but the absence of lines says nothing about the cluster.
pub fn next_step(strategy: &PollStrategy, report: &CycleReport) -> Step {
    if report.timed_out {
        return match strategy {
            PollStrategy::RunForever => Step::Continue,
            PollStrategy::WaitFor(regex) if report.any_line_matches(regex) => {
                Step::Stop(Outcome::ConditionFound)
            }
            _ => Step::Incomplete,
        };
    }
    match strategy {
        PollStrategy::SingleRun if report.counters.reported_any => Step::Stop(Outcome::Unhealthy),
        PollStrategy::SingleRun => Step::Stop(Outcome::Clean),
        PollStrategy::RunForever => Step::Continue,
        PollStrategy::WaitFor(regex) if report.any_line_matches(regex) => {
            Step::Stop(Outcome::ConditionFound)
        }
        PollStrategy::WaitFor(_) => Step::Continue,
        PollStrategy::While(regex) if report.any_line_matches(regex) => Step::Continue,
        PollStrategy::While(_) => Step::Stop(Outcome::Clean),
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Label printed in between-cycle status lines
    pub name: Option<String>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            name: None,
        }
    }
}

/// Turns conditions only the legacy engine suppresses into config rules
#[derive(Debug)]
pub struct MigrationAssist {
    config: EffectiveConfig,
}

impl MigrationAssist {
    pub fn new(config: EffectiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Add rules for `disagreements` and save the user config.
    ///
    /// Returns the refreshed rule set when anything was added.
    pub fn apply(&mut self, disagreements: &[Disagreement]) -> Result<Option<RuleSet>> {
        let user = self.config.user_mut();
        let mut added = 0usize;
        for disagreement in disagreements.iter().filter(|d| d.legacy_skips()) {
            if user.add_legacy_ignore(disagreement) {
                added += 1;
            }
        }
        if added == 0 {
            return Ok(None);
        }

        let path = user.ensure_path()?.display().to_string();
        user.save()?;
        tracing::info!(added, path = %path, "added rules from legacy engine to config");
        Ok(Some(self.config.rule_set()?))
    }
}

/// Drives cycles according to a [`PollStrategy`]
pub struct PollController {
    scanner: Scanner,
    filter: ConditionFilter,
    paths: Arc<ConditionPaths>,
    strategy: PollStrategy,
    options: PollOptions,
    migration: Option<MigrationAssist>,
}

impl PollController {
    pub fn new(
        scanner: Scanner,
        filter: ConditionFilter,
        paths: Arc<ConditionPaths>,
        strategy: PollStrategy,
    ) -> Self {
        Self {
            scanner,
            filter,
            paths,
            strategy,
            options: PollOptions::default(),
            migration: None,
        }
    }

    pub fn options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable migration assist; only effective in comparison modes
    pub fn migration(mut self, migration: Option<MigrationAssist>) -> Self {
        self.migration = migration;
        self
    }

    pub fn filter(&self) -> &ConditionFilter {
        &self.filter
    }

    /// Run cycles until the strategy says stop.
    ///
    /// A failing first cycle is returned as an error. Later failures are
    /// logged and the cycle is retried after the usual pause. A timed-out
    /// single run is an error; repeated strategies retry a timed-out cycle.
    pub async fn run(&mut self, sink: &mut dyn ReportSink) -> Result<Outcome> {
        let started = Instant::now();
        let mut cycles: u64 = 0;

        loop {
            let result = self
                .scanner
                .run_cycle(&self.filter, &self.paths, started, sink)
                .await;
            cycles += 1;

            let report = match result {
                Ok(report) => report,
                Err(e) if cycles > 1 && !matches!(e, KubeError::Io(_)) => {
                    tracing::warn!(cycle = cycles, error = %e, "scan cycle failed");
                    self.pause("Cycle failed. ", started, sink).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.migrate(&report)?;

            match next_step(&self.strategy, &report) {
                Step::Stop(outcome) => {
                    self.announce_stop(started, sink)?;
                    return Ok(outcome);
                }
                Step::Continue => {
                    let status = self.status();
                    self.pause(&status, started, sink).await?;
                }
                Step::Incomplete => {
                    let completed = report.counters.resource_types_scanned;
                    if matches!(self.strategy, PollStrategy::SingleRun) {
                        return Err(KubeError::CycleTimedOut { completed });
                    }
                    tracing::warn!(cycle = cycles, completed, "scan cycle timed out, not evaluating it");
                    self.pause("Cycle timed out. ", started, sink).await?;
                }
            }
        }
    }

    fn migrate(&mut self, report: &CycleReport) -> Result<()> {
        if !self.filter.mode().compares() || report.disagreements.is_empty() {
            return Ok(());
        }
        let Some(migration) = self.migration.as_mut() else {
            return Ok(());
        };
        if let Some(rules) = migration.apply(&report.disagreements)? {
            self.filter = self.filter.with_config(Arc::new(rules));
        }
        Ok(())
    }

    fn prefix(&self) -> String {
        match &self.options.name {
            Some(name) if !name.is_empty() => format!("[{}] ", name),
            _ => String::new(),
        }
    }

    fn announce_stop(&self, started: Instant, sink: &mut dyn ReportSink) -> Result<()> {
        if let PollStrategy::While(regex) = &self.strategy {
            sink.line(&format!(
                "{}Regex {} did not match. Stopping",
                self.prefix(),
                quote(regex.as_str())
            ))?;
        }
        let elapsed = started.elapsed();
        if elapsed > REPORT_DURATION_AFTER {
            sink.line(&format!("{}Stopping after {}", self.prefix(), whole_seconds(elapsed)))?;
        }
        Ok(())
    }

    /// Why the controller keeps going after a completed cycle
    fn status(&self) -> String {
        match &self.strategy {
            PollStrategy::While(regex) => format!("Regex {} did match. ", quote(regex.as_str())),
            PollStrategy::WaitFor(regex) => {
                format!("Regex {} did not match yet. ", quote(regex.as_str()))
            }
            _ => "Running forever. ".to_string(),
        }
    }

    async fn pause(&self, status: &str, started: Instant, sink: &mut dyn ReportSink) -> Result<()> {
        sink.line(&format!(
            "{}{}Waiting {} seconds, then checking again. {} ({}).",
            self.prefix(),
            status,
            self.options.interval.as_secs(),
            Local::now().format("%Y-%m-%d %H:%M:%S %z"),
            whole_seconds(started.elapsed())
        ))?;
        sink.line("")?;

        tokio::time::sleep(self.options.interval).await;
        Ok(())
    }
}

fn whole_seconds(elapsed: Duration) -> String {
    let secs = i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX);
    format_age(chrono::Duration::seconds(secs))
}
