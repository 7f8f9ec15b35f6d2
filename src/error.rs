//! Error types for the weak-keyed store and its locks.

use crate::types::KeyId;
use thiserror::Error;

/// Main error type for store and lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key is absent, or its entry belongs to a key that has died.
    #[error("Key not found: {0}")]
    NotFound(KeyId),

    /// A lock section was requested or asserted from the wrong context.
    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

impl StoreError {
    pub(crate) fn invalid_context(msg: impl Into<String>) -> Self {
        StoreError::InvalidContext(msg.into())
    }

    /// Whether this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
