//! Structural type system
//!
//! Reference types are named schemas registered with a store. Each field
//! of a schema carries a type descriptor (`int`, `[string]`, `person`,
//! `[person]`, ...) that the registry resolves to a `TypeVariant`; the
//! checker validates record values against those variants.

mod checker;
mod declaration;
mod errors;
mod registry;
mod variant;

pub use checker::{
    check_label_consistency, check_structural_consistency, check_structural_consistency_report,
    ConsistencyReport, Violation, ViolationKind,
};
pub use declaration::{
    derive_schema_from_declaration, FieldDeclaration, FieldMarker, ListDeclaration, ListMarker,
    SchemaDefinition,
};
pub use errors::{TypeError, TypeResult};
pub use registry::{FieldType, ReferenceType, TypeRegistry};
pub use variant::{TypeVariant, ANY_TYPE_ID, ANY_TYPE_NAME};
