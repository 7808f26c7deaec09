//! Structural consistency checking
//!
//! Decides whether a record's fields satisfy a reference type's schema.
//! Checks are soft: they answer `false` (or a report naming the first
//! offending field) and log a diagnostic, never an error.
//!
//! Policies:
//! - An empty list satisfies any declared list type. Its element kind is
//!   not inspected.
//! - A declared `long` accepts a stored `int`.
//! - A reference to the universal type `lxp` only needs to resolve. An
//!   `[lxp]` list only needs to be a list.
//! - A (reference, type) pair already being checked further up the stack
//!   is taken as consistent, so reference cycles terminate.

use std::collections::HashSet;
use std::fmt;

use super::registry::ReferenceType;
use super::variant::{TypeVariant, ANY_TYPE_ID};
use crate::observability::{log_event_with_fields, Event};
use crate::record::{ElementKind, Record, ScalarKind, Value};
use crate::reference::StoreReference;
use crate::store::Store;

/// Why a record failed a structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The type, or a field's declared type, is not registered
    UnknownType,
    /// A required field is absent
    MissingField,
    /// A required field holds a value of the wrong kind, or a reference
    /// that does not resolve to a conforming record
    WrongKind { found: String },
}

/// The first offending field found by a structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// `None` when the type itself is not registered
    pub field: Option<String>,
    pub expected: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.as_deref().unwrap_or("<type>");
        match &self.kind {
            ViolationKind::UnknownType => write!(f, "{}: unknown type {}", field, self.expected),
            ViolationKind::MissingField => {
                write!(f, "{}: missing (expected {})", field, self.expected)
            }
            ViolationKind::WrongKind { found } => {
                write!(f, "{}: expected {}, found {}", field, self.expected, found)
            }
        }
    }
}

/// Outcome of checking one record against one reference type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub type_id: u64,
    pub type_name: Option<String>,
    pub record_id: Option<u64>,
    pub violation: Option<Violation>,
    /// Field names the record actually holds, in insertion order
    pub present_fields: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violation.is_none()
    }
}

/// Returns whether `record` satisfies the schema of type `type_id`.
///
/// A failure is logged with the offending field and the record's other
/// field names.
pub fn check_structural_consistency(store: &Store, record: &Record, type_id: u64) -> bool {
    check_structural_consistency_report(store, record, type_id).is_consistent()
}

/// Like `check_structural_consistency`, returning the details.
pub fn check_structural_consistency_report(
    store: &Store,
    record: &Record,
    type_id: u64,
) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        type_id,
        type_name: None,
        record_id: record.id(),
        violation: None,
        present_fields: record.field_names().map(str::to_string).collect(),
    };

    match store.reference_type_by_id(type_id) {
        Ok(reference_type) => {
            report.type_name = Some(reference_type.name().to_string());
            report.violation = Checker::new(store).check_record(record, &reference_type);
        }
        Err(_) => {
            report.violation = Some(Violation {
                field: None,
                expected: format!("type#{}", type_id),
                kind: ViolationKind::UnknownType,
            });
        }
    }

    if let Some(violation) = &report.violation {
        log_failure(&report, violation);
    }
    report
}

/// Checks a record's type label against an expected type.
///
/// An unlabelled record is consistent, as is one labelled with the
/// expected id. A record labelled with another type is consistent when the
/// two registered schemas are equivalent field by field.
pub fn check_label_consistency(store: &Store, record: &Record, expected_type_id: u64) -> bool {
    let label = match record.type_label() {
        None => return true,
        Some(label) if label == expected_type_id => return true,
        Some(label) => label,
    };

    match (
        store.reference_type_by_id(label),
        store.reference_type_by_id(expected_type_id),
    ) {
        (Ok(labelled), Ok(expected)) => labelled.is_equivalent_to(&expected),
        _ => false,
    }
}

fn log_failure(report: &ConsistencyReport, violation: &Violation) {
    let offending = violation.field.as_deref().unwrap_or("");
    let others = report
        .present_fields
        .iter()
        .filter(|f| f.as_str() != offending)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let record_id = report
        .record_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    let type_name = report.type_name.as_deref().unwrap_or("");
    let detail = violation.to_string();

    log_event_with_fields(
        Event::StructuralCheckFailed,
        &[
            ("detail", &detail),
            ("expected", &violation.expected),
            ("field", offending),
            ("other_fields", &others),
            ("record_id", &record_id),
            ("type", type_name),
        ],
    );
}

struct Checker<'s> {
    store: &'s Store,
    in_progress: HashSet<(StoreReference, u64)>,
}

impl<'s> Checker<'s> {
    fn new(store: &'s Store) -> Self {
        Self {
            store,
            in_progress: HashSet::new(),
        }
    }

    fn check_record(&mut self, record: &Record, reference_type: &ReferenceType) -> Option<Violation> {
        for field in reference_type.fields() {
            let expected = field.descriptor().to_string();
            let value = match record.get(field.name()) {
                Ok(value) => value,
                Err(_) => {
                    return Some(Violation {
                        field: Some(field.name().to_string()),
                        expected,
                        kind: ViolationKind::MissingField,
                    })
                }
            };

            if !self.is_consistent(field.variant(), value) {
                let kind = if field.variant().is_unknown() {
                    ViolationKind::UnknownType
                } else {
                    ViolationKind::WrongKind {
                        found: value.kind_tag(),
                    }
                };
                return Some(Violation {
                    field: Some(field.name().to_string()),
                    expected,
                    kind,
                });
            }
        }
        None
    }

    /// The single validation function over type variants.
    fn is_consistent(&mut self, variant: &TypeVariant, value: &Value) -> bool {
        match variant {
            TypeVariant::Scalar(kind) => value.matches_scalar(*kind),

            TypeVariant::ScalarList(kind) => match value {
                Value::List(list) => {
                    list.is_empty() || list.iter().all(|item| item.matches_scalar(*kind))
                }
                _ => false,
            },

            TypeVariant::ReferenceList(type_id) => match value {
                Value::List(list) if list.is_empty() => true,
                // Elements of an [lxp] list are not inspected.
                Value::List(_) if *type_id == ANY_TYPE_ID => true,
                Value::List(list) => {
                    if list.element() != ElementKind::Reference
                        && list.element() != ElementKind::Scalar(ScalarKind::String)
                    {
                        return false;
                    }
                    list.iter().all(|item| match item {
                        Value::String(s) if s.is_empty() => true,
                        item => match item.as_reference() {
                            Some(reference) => self.check_reference(&reference, *type_id),
                            None => false,
                        },
                    })
                }
                _ => false,
            },

            TypeVariant::Reference(type_id) => match value.as_reference() {
                Some(reference) => self.check_reference(&reference, *type_id),
                None => false,
            },

            TypeVariant::Unknown(descriptor) => {
                log_event_with_fields(Event::UnknownTypeDescriptor, &[("descriptor", descriptor)]);
                false
            }
        }
    }

    /// Resolves `reference` and checks the referend against `type_id`.
    fn check_reference(&mut self, reference: &StoreReference, type_id: u64) -> bool {
        let referend = match self.store.resolve(reference) {
            Ok(record) => record,
            Err(_) => return false,
        };
        if type_id == ANY_TYPE_ID {
            return true;
        }

        let key = (reference.clone(), type_id);
        if !self.in_progress.insert(key.clone()) {
            return true;
        }
        let consistent = match self.store.reference_type_by_id(type_id) {
            Ok(reference_type) => self.check_record(&referend, &reference_type).is_none(),
            Err(_) => false,
        };
        self.in_progress.remove(&key);
        consistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TypedList;
    use crate::store::BucketKind;
    use crate::types::SchemaDefinition;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::open_at(temp.path()).unwrap();
        (temp, store)
    }

    #[test]
    fn test_scalar_fields() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("age", "INT").field("big", "long"))
            .unwrap();

        let good = Record::new().with("age", 3).unwrap().with("big", 4).unwrap();
        assert!(check_structural_consistency(&store, &good, t));

        let wrong = Record::new().with("age", 3i64).unwrap().with("big", 4).unwrap();
        let report = check_structural_consistency_report(&store, &wrong, t);
        let violation = report.violation.unwrap();
        assert_eq!(violation.field.as_deref(), Some("age"));
        assert_eq!(
            violation.kind,
            ViolationKind::WrongKind {
                found: "long".into()
            }
        );
    }

    #[test]
    fn test_missing_field_report() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("name", "string"))
            .unwrap();
        let record = Record::new().with("other", 1).unwrap();

        let report = check_structural_consistency_report(&store, &record, t);
        assert!(!report.is_consistent());
        assert_eq!(report.type_name.as_deref(), Some("t"));
        assert_eq!(report.present_fields, vec!["other".to_string()]);
        assert_eq!(report.violation.unwrap().kind, ViolationKind::MissingField);
    }

    #[test]
    fn test_extra_fields_are_allowed() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("a", "boolean"))
            .unwrap();
        let record = Record::new().with("a", true).unwrap().with("b", 1.5).unwrap();
        assert!(check_structural_consistency(&store, &record, t));
    }

    #[test]
    fn test_unregistered_type_fails() {
        let (_temp, store) = setup();
        let report = check_structural_consistency_report(&store, &Record::new(), 999);
        assert_eq!(report.violation.unwrap().kind, ViolationKind::UnknownType);
    }

    #[test]
    fn test_unknown_descriptor_never_validates() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("x", "blob"))
            .unwrap();
        let record = Record::new().with("x", "anything").unwrap();
        let report = check_structural_consistency_report(&store, &record, t);
        assert_eq!(report.violation.unwrap().kind, ViolationKind::UnknownType);
    }

    #[test]
    fn test_scalar_list_elements() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("xs", "[long]"))
            .unwrap();

        let ints = TypedList::from_values(ElementKind::Scalar(ScalarKind::Int), [1, 2]).unwrap();
        assert!(check_structural_consistency(
            &store,
            &Record::new().with("xs", ints).unwrap(),
            t
        ));

        let strings = TypedList::from_values(ElementKind::Scalar(ScalarKind::String), ["a"]).unwrap();
        assert!(!check_structural_consistency(
            &store,
            &Record::new().with("xs", strings).unwrap(),
            t
        ));

        assert!(!check_structural_consistency(
            &store,
            &Record::new().with("xs", 1i64).unwrap(),
            t
        ));
    }

    #[test]
    fn test_reference_to_any_only_needs_to_resolve() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("r", "lxp"))
            .unwrap();
        let repo = store.make_repository("r").unwrap();
        let bucket = repo.make_bucket("b", BucketKind::DirectoryBacked, None).unwrap();
        let mut target = Record::new().with("anything", 1).unwrap();
        let id = bucket.make_persistent(&mut target).unwrap();

        let good = Record::new().with("r", bucket.reference_to(id)).unwrap();
        assert!(check_structural_consistency(&store, &good, t));

        let encoded = Record::new()
            .with("r", bucket.reference_to(id).encode())
            .unwrap();
        assert!(check_structural_consistency(&store, &encoded, t));

        let dangling = Record::new()
            .with("r", StoreReference::new("r", "b", id + 100).unwrap())
            .unwrap();
        assert!(!check_structural_consistency(&store, &dangling, t));

        let garbage = Record::new().with("r", "not/a/reference").unwrap();
        assert!(!check_structural_consistency(&store, &garbage, t));
    }

    #[test]
    fn test_any_reference_list_elements_are_not_resolved() {
        let (_temp, store) = setup();
        let t = store
            .register_type("t", &SchemaDefinition::new().field("xs", "[lxp]"))
            .unwrap();
        let record = Record::new()
            .with(
                "xs",
                TypedList::of_references([StoreReference::new("r", "b", 4242).unwrap()]),
            )
            .unwrap();
        assert!(check_structural_consistency(&store, &record, t));

        // A named element type still requires the referend.
        store
            .register_type("place", &SchemaDefinition::new().field("town", "string"))
            .unwrap();
        let u = store
            .register_type("u", &SchemaDefinition::new().field("xs", "[place]"))
            .unwrap();
        assert!(!check_structural_consistency(&store, &record, u));

        let not_a_list = Record::new().with("xs", "r/b/4242").unwrap();
        assert!(!check_structural_consistency(&store, &not_a_list, t));
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let (_temp, store) = setup();
        let node = store
            .register_type(
                "node",
                &SchemaDefinition::new()
                    .field("label", "string")
                    .field("next", "node"),
            )
            .unwrap();
        let repo = store.make_repository("g").unwrap();
        let bucket = repo.make_bucket("nodes", BucketKind::DirectoryBacked, None).unwrap();

        // Ids are allocated in order, so the first node can point at the second.
        let first_id = store.peek_next_id();
        let second_ref = bucket.reference_to(first_id + 1);
        let first_ref = bucket.reference_to(first_id);

        let mut first = Record::new()
            .with("label", "a")
            .unwrap()
            .with("next", second_ref)
            .unwrap();
        let mut second = Record::new()
            .with("label", "b")
            .unwrap()
            .with("next", first_ref)
            .unwrap();
        assert_eq!(bucket.make_persistent(&mut first).unwrap(), first_id);
        assert_eq!(bucket.make_persistent(&mut second).unwrap(), first_id + 1);

        assert!(check_structural_consistency(&store, &first, node));
    }

    #[test]
    fn test_label_consistency_paths() {
        let (_temp, store) = setup();
        let a = store
            .register_type("a", &SchemaDefinition::new().field("x", "int"))
            .unwrap();
        let a2 = store
            .register_type("a2", &SchemaDefinition::new().field("x", "int"))
            .unwrap();
        let b = store
            .register_type("b", &SchemaDefinition::new().field("y", "string"))
            .unwrap();

        assert!(check_label_consistency(&store, &Record::new(), b));
        assert!(check_label_consistency(&store, &Record::with_type_label(a), a));
        assert!(check_label_consistency(&store, &Record::with_type_label(a2), a));
        assert!(!check_label_consistency(&store, &Record::with_type_label(b), a));
        assert!(!check_label_consistency(&store, &Record::with_type_label(404), a));
    }
}
