//! check-conditions - report unhealthy conditions of all resources in a cluster

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use check_conditions_kube::Outcome;

mod commands;
mod error;
mod exit_codes;

use commands::check::{CheckArgs, StrategyArg};

#[derive(Parser)]
#[command(name = "check-conditions")]
#[command(version)]
#[command(about = "Check your cluster by looking at status.conditions of the resources")]
#[command(long_about = "Check your cluster by looking at status.conditions of the resources

Output is usually:

  namespace resource resource-name Condition type=status reason \"message\" (age)")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Create more output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seconds to sleep between two cycles
    #[arg(short, long, global = true, default_value_t = 15, value_name = "SECONDS")]
    sleep: u64,

    /// Abort a cycle after this many seconds and summarize what was scanned
    #[arg(short, long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// A label printed in the output, useful when several terminals run `while`
    #[arg(long, global = true)]
    name: Option<String>,

    /// Only check the given namespace and skip cluster-scoped resources
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// How often to try the first connection to the cluster; 0 retries forever
    #[arg(long, global = true, default_value_t = 5)]
    retry_count: u32,

    /// Classification mode: only-legacy (default), only-config, legacy-compare-config, config-compare-legacy
    #[arg(long, global = true, env = "CHECK_CONDITIONS_MODE")]
    mode: Option<String>,

    /// Number of resource types listed concurrently
    #[arg(long, global = true, default_value_t = 10)]
    workers: usize,

    /// Rule config file (default: search .config/check-conditions/check-conditions.yaml upwards)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append rules for conditions which only the legacy logic ignores
    #[arg(long, global = true)]
    auto_add_from_legacy_config: bool,

    /// Skip loading the embedded built-in rule config
    #[arg(long, global = true)]
    skip_loading_built_in_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check all conditions of all resources once
    All,

    /// Check all conditions of all resources again and again
    Forever,

    /// Check repeatedly, stop when a reported line matches the regex. Use '.' to wait for the first unhealthy condition
    Waitfor {
        /// Regex matched against each reported line
        regex: String,
    },

    /// Check repeatedly, stop when no reported line matches the regex. Use '.' to wait until all conditions are healthy
    While {
        /// Regex matched against each reported line
        regex: String,
    },
}

impl Cli {
    fn into_check_args(self) -> CheckArgs {
        let strategy = match self.command {
            Commands::All => StrategyArg::All,
            Commands::Forever => StrategyArg::Forever,
            Commands::Waitfor { regex } => StrategyArg::WaitFor(regex),
            Commands::While { regex } => StrategyArg::While(regex),
        };
        CheckArgs {
            strategy,
            mode: self.mode,
            sleep: self.sleep,
            timeout: self.timeout,
            name: self.name,
            namespace: self.namespace,
            retry_count: self.retry_count,
            workers: self.workers,
            config: self.config,
            auto_add_from_legacy_config: self.auto_add_from_legacy_config,
            skip_loading_built_in_config: self.skip_loading_built_in_config,
        }
    }
}

fn init_logging(verbose: bool) {
    let debug = verbose || std::env::var("CHECK_CONDITIONS_DEBUG").is_ok_and(|v| !v.is_empty());
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn outcome_exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Clean | Outcome::ConditionFound => exit_codes::SUCCESS,
        Outcome::Unhealthy => exit_codes::UNHEALTHY,
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let code = match commands::check::run(cli.into_check_args()).await {
        Ok(outcome) => outcome_exit_code(outcome),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    std::process::exit(code);
}
