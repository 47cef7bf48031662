//! Error types for load test runs.

use store_client::{OperationKind, StoreError};
use thiserror::Error;

/// Result type alias using LoadTestError.
pub type LoadTestResult<T> = Result<T, LoadTestError>;

/// Everything that can stop a run or a single worker.
#[derive(Debug, Error)]
pub enum LoadTestError {
    // === Configuration Errors (detected before any worker starts) ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid {kind} {field}: {message}")]
    InvalidPayload {
        kind: OperationKind,
        field: &'static str,
        message: String,
    },

    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Worker Errors (fatal to one worker only) ===
    #[error("worker {worker_id}: {source}")]
    Connection {
        worker_id: usize,
        #[source]
        source: StoreError,
    },

    #[error("worker {worker_id}: {kind} operation failed: {source}")]
    Operation {
        worker_id: usize,
        kind: OperationKind,
        #[source]
        source: StoreError,
    },

    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },
}

impl LoadTestError {
    /// True for errors raised while building the run configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LoadTestError::Config(_)
                | LoadTestError::InvalidPayload { .. }
                | LoadTestError::Io(_)
                | LoadTestError::Yaml(_)
        )
    }

    /// The worker this error belongs to, if any.
    pub fn worker_id(&self) -> Option<usize> {
        match self {
            LoadTestError::Connection { worker_id, .. }
            | LoadTestError::Operation { worker_id, .. }
            | LoadTestError::WorkerPanicked { worker_id, .. } => Some(*worker_id),
            _ => None,
        }
    }
}
