//! Store errors

use thiserror::Error;

use crate::record::RecordError;
use crate::reference::ReferenceError;
use crate::types::TypeError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store, repository and bucket errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    // Repository lifecycle
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Repository already exists: {0}")]
    RepositoryExists(String),

    // Bucket lifecycle
    #[error("Bucket not found: {repository}/{bucket}")]
    BucketNotFound { repository: String, bucket: String },

    #[error("Bucket already exists: {repository}/{bucket}")]
    BucketExists { repository: String, bucket: String },

    #[error("Illegal {what} name: '{name}'")]
    IllegalName { what: &'static str, name: String },

    // Records
    #[error("Record {id} not found in {repository}/{bucket}")]
    RecordNotFound {
        repository: String,
        bucket: String,
        id: u64,
    },

    #[error("Record {id} is already stored in {repository}/{bucket}")]
    DuplicateId {
        repository: String,
        bucket: String,
        id: u64,
    },

    /// Only raised when the store is configured for strict enforcement
    #[error("Record does not conform to type '{type_name}': {detail}")]
    TypeViolation { type_name: String, detail: String },

    // Storage
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt data at {path}: {reason}")]
    Corruption { path: String, reason: String },

    #[error("Store has been closed")]
    StoreClosed,

    #[error("Internal error: {0}")]
    Internal(String),

    // Wrapped
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl StoreError {
    pub(crate) fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        StoreError::Io(format!("{}: {}", context, err))
    }

    pub(crate) fn poisoned() -> Self {
        StoreError::Internal("Lock poisoned".into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::RepositoryNotFound(_) => "STORR_REPOSITORY_NOT_FOUND",
            StoreError::RepositoryExists(_) => "STORR_REPOSITORY_EXISTS",
            StoreError::BucketNotFound { .. } => "STORR_BUCKET_NOT_FOUND",
            StoreError::BucketExists { .. } => "STORR_BUCKET_EXISTS",
            StoreError::IllegalName { .. } => "STORR_ILLEGAL_NAME",
            StoreError::RecordNotFound { .. } => "STORR_RECORD_NOT_FOUND",
            StoreError::DuplicateId { .. } => "STORR_DUPLICATE_ID",
            StoreError::TypeViolation { .. } => "STORR_TYPE_VIOLATION",
            StoreError::Io(_) => "STORR_IO_ERROR",
            StoreError::Corruption { .. } => "STORR_DATA_CORRUPTION",
            StoreError::StoreClosed => "STORR_STORE_CLOSED",
            StoreError::Internal(_) => "STORR_INTERNAL",
            StoreError::Record(e) => e.code(),
            StoreError::Reference(e) => e.code(),
            StoreError::Type(e) => e.code(),
        }
    }

    /// Whether the error means "the thing asked for is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::RepositoryNotFound(_)
                | StoreError::BucketNotFound { .. }
                | StoreError::RecordNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            StoreError::RepositoryNotFound("r".into()).code(),
            "STORR_REPOSITORY_NOT_FOUND"
        );
        assert_eq!(
            StoreError::Record(RecordError::KeyNotFound("k".into())).code(),
            "STORR_KEY_NOT_FOUND"
        );
    }

    #[test]
    fn test_not_found() {
        let err = StoreError::RecordNotFound {
            repository: "r".into(),
            bucket: "b".into(),
            id: 3,
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("r/b"));
        assert!(!StoreError::StoreClosed.is_not_found());
    }
}
