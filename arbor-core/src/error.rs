//! Error types for Arbor operations

use std::fmt;

use crate::{Depth, DocumentId};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Document not found in store: {id}")]
    NotFound { id: DocumentId },

    #[error("Insert failed: {reason}")]
    InsertFailed { reason: String },

    #[error("Update failed for document {id}: {reason}")]
    UpdateFailed { id: DocumentId, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Tree invariant violations detected before any write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Document doesn't exist: {id}")]
    DocumentNotFound { id: DocumentId },

    #[error("Document {id} already has parent {parent_id}")]
    AlreadyHasParent { id: DocumentId, parent_id: DocumentId },

    #[error("Nesting level exceeded by document {id}: needs {required}, allowed {limit}")]
    NestingLevelExceeded {
        id: DocumentId,
        required: Depth,
        limit: Depth,
    },

    #[error("Document {id} can't be nested in its own tree")]
    SelfNested { id: DocumentId },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Child {id} listed more than once")]
    DuplicateChild { id: DocumentId },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Arbor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArborError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Arbor operations.
pub type ArborResult<T> = Result<T, ArborError>;

/// Caller-facing error taxonomy. Every [`ArborError`] falls in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DocumentNotFound,
    AlreadyHasParent,
    NestingLevelExceeded,
    InvalidInput,
    TransactionFailed,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ArborError {
    pub fn not_found(id: DocumentId) -> Self {
        ArborError::Tree(TreeError::DocumentNotFound { id })
    }

    pub fn transaction_failed(reason: impl Into<String>) -> Self {
        ArborError::Storage(StorageError::TransactionFailed {
            reason: reason.into(),
        })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArborError::Tree(TreeError::DocumentNotFound { .. })
            | ArborError::Storage(StorageError::NotFound { .. }) => ErrorKind::DocumentNotFound,
            ArborError::Tree(TreeError::AlreadyHasParent { .. }) => ErrorKind::AlreadyHasParent,
            ArborError::Tree(TreeError::NestingLevelExceeded { .. }) => {
                ErrorKind::NestingLevelExceeded
            }
            ArborError::Tree(TreeError::SelfNested { .. }) | ArborError::Validation(_) => {
                ErrorKind::InvalidInput
            }
            ArborError::Storage(StorageError::TransactionFailed { .. }) => {
                ErrorKind::TransactionFailed
            }
            ArborError::Storage(_) | ArborError::Config(_) => ErrorKind::Internal,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
