//! Field values
//!
//! Supported kinds:
//! - string, int (32-bit), long (64-bit), double, boolean
//! - reference: a store reference to another record
//! - list: a homogeneous `TypedList` whose element kind is fixed when the
//!   list is created, so an empty list still knows what it would hold

use std::fmt;

use super::errors::{RecordError, RecordResult};
use crate::reference::StoreReference;

/// Scalar value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Int,
    Long,
    Double,
    Boolean,
}

impl ScalarKind {
    /// All scalar kinds, in descriptor order
    pub const ALL: [ScalarKind; 5] = [
        ScalarKind::String,
        ScalarKind::Int,
        ScalarKind::Long,
        ScalarKind::Double,
        ScalarKind::Boolean,
    ];

    /// Canonical lower-case name, as used in type descriptors
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Double => "double",
            ScalarKind::Boolean => "boolean",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Whether a value stored as `stored` satisfies this kind.
    ///
    /// `long` accepts `int` values.
    pub fn accepts(&self, stored: ScalarKind) -> bool {
        *self == stored || (*self == ScalarKind::Long && stored == ScalarKind::Int)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element kind of a `TypedList`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scalar(ScalarKind),
    Reference,
}

impl ElementKind {
    /// Name used in kind tags, e.g. `int` or `reference`
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Scalar(kind) => kind.name(),
            ElementKind::Reference => REFERENCE_TAG,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) const REFERENCE_TAG: &str = "reference";

/// A homogeneous list that carries its element kind explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedList {
    element: ElementKind,
    items: Vec<Value>,
}

impl TypedList {
    /// Creates an empty list of the given element kind
    pub fn new(element: ElementKind) -> Self {
        Self {
            element,
            items: Vec::new(),
        }
    }

    /// Creates a list from values, failing on the first value of the wrong kind
    pub fn from_values<I>(element: ElementKind, values: I) -> RecordResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut list = Self::new(element);
        for value in values {
            list.push(value)?;
        }
        Ok(list)
    }

    /// A list of references
    pub fn of_references<I>(references: I) -> Self
    where
        I: IntoIterator<Item = StoreReference>,
    {
        Self {
            element: ElementKind::Reference,
            items: references.into_iter().map(Value::Reference).collect(),
        }
    }

    /// Appends a value.
    ///
    /// An `int` pushed onto a `long` list is widened.
    pub fn push(&mut self, value: impl Into<Value>) -> RecordResult<()> {
        let value = value.into();
        let value = match (self.element, value) {
            (ElementKind::Scalar(ScalarKind::Long), Value::Int(i)) => Value::Long(i64::from(i)),
            (ElementKind::Reference, v @ Value::Reference(_)) => v,
            (ElementKind::Scalar(kind), v) if v.scalar_kind() == Some(kind) => v,
            (_, v) => {
                return Err(RecordError::HeterogeneousList {
                    expected: self.element.name().to_string(),
                    actual: v.kind_tag(),
                })
            }
        };
        self.items.push(value);
        Ok(())
    }

    /// Element kind
    pub fn element(&self) -> ElementKind {
        self.element
    }

    /// Elements, in order
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    /// The references held by a reference list, in order.
    ///
    /// Returns `None` for scalar lists.
    pub fn references(&self) -> Option<Vec<&StoreReference>> {
        if self.element != ElementKind::Reference {
            return None;
        }
        Some(
            self.items
                .iter()
                .filter_map(|v| match v {
                    Value::Reference(r) => Some(r),
                    _ => None,
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a TypedList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Reference(StoreReference),
    List(TypedList),
}

impl Value {
    /// Scalar kind of this value, if it is a scalar
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Value::String(_) => Some(ScalarKind::String),
            Value::Int(_) => Some(ScalarKind::Int),
            Value::Long(_) => Some(ScalarKind::Long),
            Value::Double(_) => Some(ScalarKind::Double),
            Value::Boolean(_) => Some(ScalarKind::Boolean),
            Value::Reference(_) | Value::List(_) => None,
        }
    }

    /// Whether this value satisfies a declared scalar kind
    pub fn matches_scalar(&self, kind: ScalarKind) -> bool {
        self.scalar_kind().is_some_and(|stored| kind.accepts(stored))
    }

    /// Kind tag as written in record files: `int`, `reference`, `[string]`, ...
    pub fn kind_tag(&self) -> String {
        match self {
            Value::Reference(_) => REFERENCE_TAG.to_string(),
            Value::List(list) => format!("[{}]", list.element().name()),
            other => other
                .scalar_kind()
                .map(|k| k.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// The store reference held by this value, accepting encoded strings.
    pub fn as_reference(&self) -> Option<StoreReference> {
        match self {
            Value::Reference(r) => Some(r.clone()),
            Value::String(s) => StoreReference::parse(s).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Reference(r) => write!(f, "{}", r),
            Value::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<StoreReference> for Value {
    fn from(v: StoreReference) -> Self {
        Value::Reference(v)
    }
}

impl From<TypedList> for Value {
    fn from(v: TypedList) -> Self {
        Value::List(v)
    }
}
