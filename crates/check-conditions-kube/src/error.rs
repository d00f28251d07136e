//! Error types for check-conditions-kube

use thiserror::Error;

/// Result type for check-conditions-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while talking to the cluster or running cycles
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Resource discovery failed
    #[error("resource discovery failed: {0}")]
    Discovery(String),

    /// The API server could not be reached within the retry budget
    #[error("could not connect to the API server after {attempts} attempt(s): {message}\nHint: Check your kubeconfig and that the cluster is reachable")]
    ConnectionFailed { attempts: u32, message: String },

    /// Rule or config error from the core crate
    #[error(transparent)]
    Core(#[from] check_conditions_core::CoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A single run hit its timeout, so its report is incomplete
    #[error("scan cycle timed out after checking {completed} resource types")]
    CycleTimedOut { completed: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 403 Forbidden error
    pub fn is_forbidden(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 403)
    }

    /// Whether the error comes from a malformed rule configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, KubeError::Core(e) if e.is_config_error())
    }
}
