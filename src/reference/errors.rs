//! Store reference errors

use thiserror::Error;

/// Result type for reference parsing
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Errors raised while building or parsing a store reference.
///
/// Failure to find the referend is reported by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Malformed store reference '{input}': {reason}")]
    Malformed { input: String, reason: String },

    #[error("Invalid {what} name in store reference: '{name}'")]
    InvalidName { what: &'static str, name: String },
}

impl ReferenceError {
    pub(crate) fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ReferenceError::Malformed {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ReferenceError::Malformed { .. } => "STORR_REFERENCE_MALFORMED",
            ReferenceError::InvalidName { .. } => "STORR_REFERENCE_INVALID_NAME",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_input() {
        let err = ReferenceError::malformed("x/y", "expected repository/bucket/id");
        let display = err.to_string();
        assert!(display.contains("x/y"));
        assert!(display.contains("expected"));
    }
}
