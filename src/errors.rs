// Copyright 2025 Cowboy AI, LLC.

//! Error types for data access operations

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur in data access operations
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// Caller violated a lifecycle precondition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Referenced record was absent at mutation time
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity that wasn't found
        entity_type: String,
        /// ID that was searched for
        id: String,
    },

    /// Optimistic concurrency conflict on the version token
    #[error("Concurrency conflict: expected version {expected}, but found {actual}")]
    VersionConflict {
        /// Version the caller submitted
        expected: u64,
        /// Version currently persisted
        actual: u64,
    },

    /// Business identifier mismatch between the caller's record and the
    /// persisted one, which signals the caller holds a different logical
    /// identity behind the same primary id
    #[error("Identity conflict: expected xid {expected}, but found {actual}")]
    IdentityConflict {
        /// XId the caller submitted
        expected: String,
        /// XId currently persisted
        actual: String,
    },

    /// Filter or sort referenced a field that does not exist on the target type
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed query descriptor: unknown operator, logic, or direction,
    /// or a literal that cannot be coerced to the field's type
    #[error("Query error: {0}")]
    Query(String),

    /// Underlying document store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for data access operations
pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    /// Whether this error is a concurrency or identity conflict, i.e. the
    /// caller should re-fetch the latest record and retry
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DataError::VersionConflict { .. } | DataError::IdentityConflict { .. }
        )
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization(err.to_string())
    }
}

impl From<StoreError> for DataError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => DataError::Storage(format!("document not found: {key}")),
            StoreError::VersionConflict { expected, actual } => {
                DataError::VersionConflict { expected, actual }
            }
            StoreError::Serialization(msg) => DataError::Serialization(msg),
            StoreError::Backend(msg) => DataError::Storage(msg),
        }
    }
}
