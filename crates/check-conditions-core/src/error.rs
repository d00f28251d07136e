//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid {field} pattern {pattern:?}: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config path not set")]
    ConfigPathNotSet,
}

impl CoreError {
    /// Errors caused by the content of a rule configuration, as opposed to the environment
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidPattern { .. }
                | CoreError::InvalidConfig { .. }
                | CoreError::ConfigParse { .. }
                | CoreError::YamlParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
