//! Records
//!
//! The store's basic unit: an ordered map of typed field values with an
//! identity and an optional declared reference type.

pub mod codec;
mod errors;
mod lxp;
mod value;

pub use errors::{RecordError, RecordResult};
pub use lxp::{Record, TYPE_LABEL};
pub use value::{ElementKind, ScalarKind, TypedList, Value};
