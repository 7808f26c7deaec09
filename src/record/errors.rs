//! Record errors

use thiserror::Error;

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised by record field access and record (de)serialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Field name is empty or collides with the reserved type label
    #[error("Illegal key: '{0}'")]
    IllegalKey(String),

    #[error("Key not found: '{0}'")]
    KeyNotFound(String),

    #[error("Type mismatch on '{field}': expected {expected}, found {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A value of the wrong kind was added to a typed list
    #[error("List of {expected} cannot hold a {actual}")]
    HeterogeneousList { expected: String, actual: String },

    #[error("Record already has id {current}; cannot reassign to {attempted}")]
    IdAlreadyAssigned { current: u64, attempted: u64 },

    /// The record cannot be represented in the persisted format
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Persisted data could not be turned back into a record
    #[error("Construction failed: {0}")]
    Construction(String),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

impl RecordError {
    pub(crate) fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        RecordError::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::IllegalKey(_) => "STORR_ILLEGAL_KEY",
            RecordError::KeyNotFound(_) => "STORR_KEY_NOT_FOUND",
            RecordError::TypeMismatch { .. } => "STORR_TYPE_MISMATCH",
            RecordError::HeterogeneousList { .. } => "STORR_HETEROGENEOUS_LIST",
            RecordError::IdAlreadyAssigned { .. } => "STORR_ID_ALREADY_ASSIGNED",
            RecordError::Serialization(_) => "STORR_SERIALIZATION_FAILED",
            RecordError::Construction(_) => "STORR_CONSTRUCTION_FAILED",
            RecordError::ChecksumMismatch { .. } => "STORR_DATA_CORRUPTION",
        }
    }

    /// Whether the error came from reading persisted data back
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            RecordError::Construction(_) | RecordError::ChecksumMismatch { .. }
        )
    }
}
