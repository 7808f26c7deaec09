//! Type variants
//!
//! A `TypeVariant` is what a field's type descriptor resolves to:
//!
//! | descriptor      | variant                      |
//! |-----------------|------------------------------|
//! | `int`, `STRING` | `Scalar(kind)`               |
//! | `[long]`        | `ScalarList(kind)`           |
//! | `[person]`      | `ReferenceList(type id)`     |
//! | `person`        | `Reference(type id)`         |
//! | anything else   | `Unknown(descriptor)`        |
//!
//! Validation of a value against a variant lives in `checker`, since
//! reference variants need a store to resolve their referends.

use std::fmt;

use crate::record::ScalarKind;

/// Name of the universal reference type that every record satisfies
pub const ANY_TYPE_NAME: &str = "lxp";

/// Id of the universal reference type
pub const ANY_TYPE_ID: u64 = 0;

/// A resolved field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeVariant {
    Scalar(ScalarKind),
    ScalarList(ScalarKind),
    /// List of references to records of the given type
    ReferenceList(u64),
    /// Reference to a record of the given type
    Reference(u64),
    /// A descriptor that named neither a scalar nor a registered type.
    /// Never valid for any value.
    Unknown(String),
}

impl TypeVariant {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeVariant::Unknown(_))
    }

    /// Referenced type id, for reference and reference-list variants
    pub fn referenced_type(&self) -> Option<u64> {
        match self {
            TypeVariant::Reference(id) | TypeVariant::ReferenceList(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for TypeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeVariant::Scalar(kind) => write!(f, "{}", kind),
            TypeVariant::ScalarList(kind) => write!(f, "[{}]", kind),
            TypeVariant::ReferenceList(id) => write!(f, "[type#{}]", id),
            TypeVariant::Reference(id) => write!(f, "type#{}", id),
            TypeVariant::Unknown(descriptor) => write!(f, "unknown({})", descriptor),
        }
    }
}
