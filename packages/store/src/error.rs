//! Errors returned by graph providers and repositories.

use spangraph::{RelationError, ValidationError};

/// Errors that store operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested node, or a node a write depends on, does not exist.
    /// When returned from a write, nothing was created.
    #[error("not found: {0}")]
    NotFound(String),

    /// A node with the same ID already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The input failed validation before any transaction was opened.
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),

    /// A retryable backend condition (lock contention). Providers retry
    /// these internally; callers only see one after retries are exhausted.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// An unexpected error in the underlying backend, or graph data that
    /// does not have the expected shape.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub(crate) fn malformed(what: impl std::fmt::Display) -> Self {
        StoreError::Internal(format!("malformed graph data: {what}"))
    }
}

impl From<RelationError> for StoreError {
    fn from(e: RelationError) -> Self {
        match e {
            RelationError::UnknownExpression(id) => {
                StoreError::NotFound(format!("expression {id}"))
            }
        }
    }
}
