//! The scan commands: all, forever, waitfor, while

use regex::Regex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use check_conditions_core::{ConditionFilter, EffectiveConfig, LegacyRuleSet, Mode};
use check_conditions_kube::{
    KubeAccess, MigrationAssist, Outcome, PollController, PollOptions, PollStrategy, Scanner,
    TerminalSink,
};

use crate::error::{CliError, Result};

/// Environment variable from before `--mode` existed
const LEGACY_COMPARE_ENV: &str = "CHECK_CONDITIONS_COMPARE_WITH_NEW_CONFIG";

/// Which strategy the user asked for, before the regex is compiled
#[derive(Debug, Clone)]
pub enum StrategyArg {
    All,
    Forever,
    WaitFor(String),
    While(String),
}

impl StrategyArg {
    pub fn compile(&self) -> Result<PollStrategy> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                CliError::usage_with_help(
                    format!("invalid regex {:?}: {}", pattern, e),
                    "Use '.' to match any reported line",
                )
            })
        };
        Ok(match self {
            StrategyArg::All => PollStrategy::SingleRun,
            StrategyArg::Forever => PollStrategy::RunForever,
            StrategyArg::WaitFor(pattern) => PollStrategy::WaitFor(compile(pattern)?),
            StrategyArg::While(pattern) => PollStrategy::While(compile(pattern)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CheckArgs {
    pub strategy: StrategyArg,
    pub mode: Option<String>,
    pub sleep: u64,
    pub timeout: Option<u64>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub retry_count: u32,
    pub workers: usize,
    pub config: Option<PathBuf>,
    pub auto_add_from_legacy_config: bool,
    pub skip_loading_built_in_config: bool,
}

/// Pick the mode: `--mode`/`CHECK_CONDITIONS_MODE`, then the legacy env var, then the default
pub fn resolve_mode(flag: Option<&str>, legacy_compare: bool) -> Result<Mode> {
    match flag.map(str::trim).filter(|m| !m.is_empty()) {
        Some(raw) => Mode::from_str(&raw.to_lowercase()).map_err(|message| {
            CliError::usage_with_help(
                message,
                "Set --mode or CHECK_CONDITIONS_MODE to one of the listed modes",
            )
        }),
        None if legacy_compare => Ok(Mode::LegacyDecidesCompareConfig),
        None => Ok(Mode::default()),
    }
}

pub async fn run(args: CheckArgs) -> Result<Outcome> {
    // Argument errors first, before anything touches the disk or the cluster.
    let strategy = args.strategy.compile()?;
    let legacy_compare = std::env::var(LEGACY_COMPARE_ENV).is_ok_and(|v| !v.is_empty());
    let mode = resolve_mode(args.mode.as_deref(), legacy_compare)?;

    let cwd = std::env::current_dir()?;
    let mut config = EffectiveConfig::load(
        args.config.as_deref(),
        &cwd,
        args.skip_loading_built_in_config,
    )?;
    if !args.skip_loading_built_in_config {
        tracing::debug!("loaded built-in config");
    }
    if let Some(path) = config.user().path() {
        tracing::debug!(path = %path.display(), "using rule config");
    }

    let rules = config.rule_set()?;
    let paths = config.condition_paths()?;
    tracing::debug!(rules = rules.len(), %mode, "rules compiled");

    let filter = ConditionFilter::new(mode, Arc::new(LegacyRuleSet::builtin()?), Arc::new(rules));

    let migration = match (args.auto_add_from_legacy_config, mode.compares()) {
        (true, true) => {
            let path = config.user_mut().ensure_path()?;
            tracing::info!(path = %path.display(), "rules suppressed only by the legacy engine will be added");
            Some(MigrationAssist::new(config))
        }
        (true, false) => {
            tracing::warn!(%mode, "--auto-add-from-legacy-config needs a comparison mode, ignoring it");
            None
        }
        _ => None,
    };

    let access = KubeAccess::connect(args.retry_count).await?;
    let scanner = Scanner::new(Arc::new(access))
        .workers(args.workers)
        .namespace(args.namespace.filter(|ns| !ns.is_empty()))
        .timeout(args.timeout.filter(|t| *t > 0).map(Duration::from_secs));

    let mut controller = PollController::new(scanner, filter, Arc::new(paths), strategy)
        .options(PollOptions {
            interval: Duration::from_secs(args.sleep),
            name: args.name,
        })
        .migration(migration);

    let mut sink = TerminalSink::new();
    Ok(controller.run(&mut sink).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;

    #[test]
    fn test_resolve_mode() {
        assert_eq!(resolve_mode(None, false).unwrap(), Mode::OnlyLegacy);
        assert_eq!(
            resolve_mode(None, true).unwrap(),
            Mode::LegacyDecidesCompareConfig
        );
        assert_eq!(resolve_mode(Some(""), false).unwrap(), Mode::OnlyLegacy);
        assert_eq!(resolve_mode(Some("Only-New"), true).unwrap(), Mode::OnlyConfig);
        assert_eq!(
            resolve_mode(Some("config-compare-legacy"), false).unwrap(),
            Mode::ConfigDecidesCompareLegacy
        );
    }

    #[test]
    fn test_invalid_mode_is_usage_error() {
        let err = resolve_mode(Some("sometimes"), false).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn test_invalid_regex_is_usage_error() {
        let err = StrategyArg::WaitFor("(".to_string()).compile().unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
        assert!(matches!(
            StrategyArg::While(".".to_string()).compile().unwrap(),
            PollStrategy::While(_)
        ));
    }
}
