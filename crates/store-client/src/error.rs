//! Error types for store client operations.

use thiserror::Error;

use crate::operation::OperationKind;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store connection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A single operation call failed.
    #[error("{kind} failed: {message}")]
    Operation {
        kind: OperationKind,
        message: String,
    },

    /// A payload document could not be converted for the store.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Build an operation error for the given kind.
    pub fn operation(kind: OperationKind, message: impl Into<String>) -> Self {
        StoreError::Operation {
            kind,
            message: message.into(),
        }
    }
}
