//! The record type
//!
//! A `Record` is an insertion-ordered map from field name to `Value`,
//! plus an identity assigned by the bucket that first persists it and an
//! optional type label naming the reference type it claims to conform to.

use super::errors::{RecordError, RecordResult};
use super::value::{TypedList, Value};
use crate::reference::StoreReference;

/// Reserved field name under which the type label is persisted.
///
/// Callers may not `put` this key; use `set_type_label` instead.
pub const TYPE_LABEL: &str = "$TYPE_LABEL";

/// An ordered, string-keyed, heterogeneously typed record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: Option<u64>,
    type_label: Option<u64>,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record with no id and no type label
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record labelled with a reference type id
    pub fn with_type_label(type_id: u64) -> Self {
        Self {
            type_label: Some(type_id),
            ..Self::default()
        }
    }

    pub(crate) fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// The record's id, once it has been persisted
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Assigns the id. An id, once set, never changes.
    pub(crate) fn assign_id(&mut self, id: u64) -> RecordResult<()> {
        match self.id {
            None => {
                self.id = Some(id);
                Ok(())
            }
            Some(current) if current == id => Ok(()),
            Some(current) => Err(RecordError::IdAlreadyAssigned {
                current,
                attempted: id,
            }),
        }
    }

    /// Id of the declared reference type, if any
    pub fn type_label(&self) -> Option<u64> {
        self.type_label
    }

    pub fn set_type_label(&mut self, type_id: u64) {
        self.type_label = Some(type_id);
    }

    pub fn clear_type_label(&mut self) {
        self.type_label = None;
    }

    /// Sets a field, keeping its original position if it already exists.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) -> RecordResult<()> {
        let field = field.into();
        check_key(&field)?;
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field, value)),
        }
        Ok(())
    }

    /// Builder form of `put`
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> RecordResult<Self> {
        self.put(field, value)?;
        Ok(self)
    }

    pub fn get(&self, field: &str) -> RecordResult<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
            .ok_or_else(|| RecordError::KeyNotFound(field.to_string()))
    }

    pub fn get_string(&self, field: &str) -> RecordResult<&str> {
        match self.get(field)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(field, "string", other)),
        }
    }

    pub fn get_int(&self, field: &str) -> RecordResult<i32> {
        match self.get(field)? {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(field, "int", other)),
        }
    }

    /// Reads a `long`, widening a stored `int`
    pub fn get_long(&self, field: &str) -> RecordResult<i64> {
        match self.get(field)? {
            Value::Long(l) => Ok(*l),
            Value::Int(i) => Ok(i64::from(*i)),
            other => Err(mismatch(field, "long", other)),
        }
    }

    pub fn get_double(&self, field: &str) -> RecordResult<f64> {
        match self.get(field)? {
            Value::Double(d) => Ok(*d),
            other => Err(mismatch(field, "double", other)),
        }
    }

    pub fn get_boolean(&self, field: &str) -> RecordResult<bool> {
        match self.get(field)? {
            Value::Boolean(b) => Ok(*b),
            other => Err(mismatch(field, "boolean", other)),
        }
    }

    pub fn get_reference(&self, field: &str) -> RecordResult<&StoreReference> {
        match self.get(field)? {
            Value::Reference(r) => Ok(r),
            other => Err(mismatch(field, "reference", other)),
        }
    }

    pub fn get_list(&self, field: &str) -> RecordResult<&TypedList> {
        match self.get(field)? {
            Value::List(list) => Ok(list),
            other => Err(mismatch(field, "list", other)),
        }
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    /// Field names in insertion order. The type label is not a field.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends a field decoded from storage, bypassing the reserved-key check.
    pub(crate) fn push_decoded(&mut self, field: String, value: Value) {
        self.fields.push((field, value));
    }
}

fn check_key(field: &str) -> RecordResult<()> {
    if field.is_empty() || field == TYPE_LABEL {
        return Err(RecordError::IllegalKey(field.to_string()));
    }
    Ok(())
}

fn mismatch(field: &str, expected: &str, actual: &Value) -> RecordError {
    RecordError::type_mismatch(field, expected, actual.kind_tag())
}
