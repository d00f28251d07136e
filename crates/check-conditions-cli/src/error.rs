//! CLI error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;

use check_conditions_core::CoreError;
use check_conditions_kube::KubeError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// The cluster or the local environment is not usable
    #[error("Setup error: {message}")]
    #[diagnostic(code(check_conditions::cli::setup))]
    Setup {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Rule configuration could not be loaded
    #[error("Config error: {message}")]
    #[diagnostic(code(check_conditions::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid arguments
    #[error("Usage error: {message}")]
    #[diagnostic(code(check_conditions::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Setup { .. } => exit_codes::SETUP_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::setup(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_config_error() {
            CliError::config_with_help(
                err.to_string(),
                "Fix the rule file or pass --skip-loading-built-in-config / --config to choose another one",
            )
        } else {
            CliError::setup(err.to_string())
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Core(core) => core.into(),
            e if e.is_config_error() => CliError::Config {
                message: e.to_string(),
                help: None,
            },
            e @ KubeError::ConnectionFailed { .. } => CliError::Setup {
                message: e.to_string(),
                help: Some("Use --retry-count 0 to keep retrying".to_string()),
            },
            e @ KubeError::CycleTimedOut { .. } => CliError::Setup {
                message: e.to_string(),
                help: Some("Raise --timeout or leave it unset".to_string()),
            },
            e => CliError::setup(e.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
