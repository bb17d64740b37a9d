//! Error types for the agent autoscaler.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Upstream (Azure DevOps) errors
    #[error("Rate limited: received HTTP status {status} when calling {endpoint}, retry after {retry_after:?}")]
    RateLimited {
        status: u16,
        endpoint: String,
        retry_after: Duration,
    },

    #[error("Received HTTP status {status} when calling {endpoint}")]
    Http { status: u16, endpoint: String },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Agent pool not found: {0}")]
    PoolNotFound(String),

    // Workload errors
    #[error("Kubernetes error: {0}")]
    Kubernetes(String),

    #[error("Could not find {0}")]
    WorkloadNotFound(String),

    #[error("Resource kind {0} is not supported")]
    UnsupportedKind(String),

    #[error("{0} cannot have a HorizontalPodAutoscaler attached for the autoscaler to work")]
    ConflictingAutoscaler(String),

    #[error("Environment variable error: {0}")]
    EnvVar(String),

    // Configuration errors
    #[error("Error(s) with arguments:\n{0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The backoff hint carried by a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
