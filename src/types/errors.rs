//! Type registry and schema declaration errors

use thiserror::Error;

/// Result type for type registry operations
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors raised by the type registry and by schema derivation.
///
/// Consistency checks never produce these; they report `false` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("Type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Illegal type name: '{0}'")]
    IllegalTypeName(String),

    /// A schema declaration is contradictory or incomplete
    #[error("Invalid declaration of field '{field}': {reason}")]
    Declaration { field: String, reason: String },

    #[error("Type registry persistence failed: {0}")]
    Persistence(String),
}

impl TypeError {
    pub(crate) fn declaration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeError::Declaration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::AlreadyRegistered(_) => "STORR_TYPE_ALREADY_REGISTERED",
            TypeError::UnknownType(_) => "STORR_UNKNOWN_TYPE",
            TypeError::IllegalTypeName(_) => "STORR_ILLEGAL_TYPE_NAME",
            TypeError::Declaration { .. } => "STORR_INVALID_DECLARATION",
            TypeError::Persistence(_) => "STORR_TYPE_PERSISTENCE_FAILED",
        }
    }
}
