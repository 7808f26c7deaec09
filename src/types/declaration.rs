//! Schema declarations
//!
//! A reference type's fields can be written by hand as a
//! `SchemaDefinition` (field name -> type descriptor), or derived from a
//! static table of `FieldMarker`s:
//!
//! ```ignore
//! use storr::record::ScalarKind;
//! use storr::types::{FieldMarker, ListMarker};
//!
//! const PERSON: &[(&str, FieldMarker)] = &[
//!     ("name", FieldMarker::scalar(ScalarKind::String)),
//!     ("father", FieldMarker::reference("person")),
//!     ("children", FieldMarker::list(ListMarker::reference("person"))),
//!     ("nicknames", FieldMarker::list(ListMarker::base(ScalarKind::String))),
//! ];
//! ```
//!
//! Each field must carry exactly one kind of constraint, and a list must
//! name exactly one of a base type or a reference type.

use super::errors::{TypeError, TypeResult};
use crate::record::{Record, ScalarKind, Value};

/// Ordered field name -> type descriptor mapping for a reference type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    fields: Vec<(String, String)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field
    pub fn field(mut self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.insert(name, descriptor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: impl Into<String>) {
        let name = name.into();
        let descriptor = descriptor.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = descriptor,
            None => self.fields.push((name, descriptor)),
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads a schema record: every field must hold a descriptor string.
    pub fn from_record(record: &Record) -> TypeResult<Self> {
        let mut definition = Self::new();
        for (name, value) in record.iter() {
            match value {
                Value::String(descriptor) => definition.insert(name, descriptor.as_str()),
                other => {
                    return Err(TypeError::declaration(
                        name,
                        format!("descriptor must be a string, found {}", other.kind_tag()),
                    ))
                }
            }
        }
        Ok(definition)
    }

    /// The schema as a record of descriptor strings.
    ///
    /// Fails with `TypeError::Declaration` on a field name a record cannot
    /// hold.
    pub fn to_record(&self) -> TypeResult<Record> {
        let mut record = Record::new();
        for (name, descriptor) in self.iter() {
            record
                .put(name, descriptor)
                .map_err(|e| TypeError::declaration(name, e.to_string()))?;
        }
        Ok(record)
    }
}

/// Element constraint of a list field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListMarker {
    base: Option<ScalarKind>,
    reference: Option<&'static str>,
}

impl ListMarker {
    /// List of scalars
    pub const fn base(kind: ScalarKind) -> Self {
        Self {
            base: Some(kind),
            reference: None,
        }
    }

    /// List of references to the named type
    pub const fn reference(type_name: &'static str) -> Self {
        Self {
            base: None,
            reference: Some(type_name),
        }
    }

    pub const fn with_base(self, kind: ScalarKind) -> Self {
        Self {
            base: Some(kind),
            ..self
        }
    }

    pub const fn with_reference(self, type_name: &'static str) -> Self {
        Self {
            reference: Some(type_name),
            ..self
        }
    }
}

/// The constraints declared on one field.
///
/// Markers stack the way field annotations do; `resolve` rejects any
/// combination other than exactly one constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldMarker {
    scalar: Option<ScalarKind>,
    reference: Option<&'static str>,
    list: Option<ListMarker>,
}

impl FieldMarker {
    pub const fn scalar(kind: ScalarKind) -> Self {
        Self {
            scalar: Some(kind),
            reference: None,
            list: None,
        }
    }

    pub const fn reference(type_name: &'static str) -> Self {
        Self {
            scalar: None,
            reference: Some(type_name),
            list: None,
        }
    }

    pub const fn list(list: ListMarker) -> Self {
        Self {
            scalar: None,
            reference: None,
            list: Some(list),
        }
    }

    pub const fn and_scalar(self, kind: ScalarKind) -> Self {
        Self {
            scalar: Some(kind),
            ..self
        }
    }

    pub const fn and_reference(self, type_name: &'static str) -> Self {
        Self {
            reference: Some(type_name),
            ..self
        }
    }

    pub const fn and_list(self, list: ListMarker) -> Self {
        Self {
            list: Some(list),
            ..self
        }
    }

    /// Resolves the markers of `field` into a single declaration.
    pub fn resolve(&self, field: &str) -> TypeResult<FieldDeclaration> {
        let declared = [
            self.scalar.is_some(),
            self.reference.is_some(),
            self.list.is_some(),
        ]
        .iter()
        .filter(|d| **d)
        .count();

        if declared == 0 {
            return Err(TypeError::declaration(field, "no type constraint declared"));
        }
        if declared > 1 {
            return Err(TypeError::declaration(
                field,
                "more than one kind of constraint declared",
            ));
        }

        if let Some(kind) = self.scalar {
            return Ok(FieldDeclaration::Scalar(kind));
        }
        if let Some(type_name) = self.reference {
            return Ok(FieldDeclaration::Reference(type_name.to_string()));
        }

        match self.list {
            Some(ListMarker {
                base: Some(_),
                reference: Some(_),
            }) => Err(TypeError::declaration(
                field,
                "list declares both a base type and a reference type",
            )),
            Some(ListMarker {
                base: Some(kind),
                reference: None,
            }) => Ok(FieldDeclaration::List(ListDeclaration::Scalar(kind))),
            Some(ListMarker {
                base: None,
                reference: Some(type_name),
            }) => Ok(FieldDeclaration::List(ListDeclaration::Reference(
                type_name.to_string(),
            ))),
            _ => Err(TypeError::declaration(
                field,
                "list declares neither a base type nor a reference type",
            )),
        }
    }
}

/// A field's single resolved constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDeclaration {
    Scalar(ScalarKind),
    Reference(String),
    List(ListDeclaration),
}

/// Element type of a declared list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDeclaration {
    Scalar(ScalarKind),
    Reference(String),
}

impl FieldDeclaration {
    /// The type descriptor this declaration stands for
    pub fn descriptor(&self) -> String {
        match self {
            FieldDeclaration::Scalar(kind) => kind.name().to_string(),
            FieldDeclaration::Reference(type_name) => type_name.clone(),
            FieldDeclaration::List(ListDeclaration::Scalar(kind)) => format!("[{}]", kind),
            FieldDeclaration::List(ListDeclaration::Reference(type_name)) => {
                format!("[{}]", type_name)
            }
        }
    }
}

/// Builds a schema from a static declaration table.
///
/// Fails on the first field whose markers are contradictory or missing,
/// or on a field declared twice.
pub fn derive_schema_from_declaration(
    declaration: &[(&str, FieldMarker)],
) -> TypeResult<SchemaDefinition> {
    let mut definition = SchemaDefinition::new();
    for (field, marker) in declaration {
        if definition.descriptor(field).is_some() {
            return Err(TypeError::declaration(*field, "declared more than once"));
        }
        let resolved = marker.resolve(field)?;
        definition.insert(*field, resolved.descriptor());
    }
    Ok(definition)
}
