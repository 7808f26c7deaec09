//! Schema Invariant Tests
//!
//! Structural and label consistency of records against reference types:
//! - A missing required field or a wrong-kind value fails the check
//! - Empty lists satisfy any declared list type
//! - References are resolved and checked recursively
//! - Label consistency falls back to comparing two schemas field by field
//! - Buckets enforcing a type log (advisory) or reject (strict) violations

use storr::record::{ElementKind, ScalarKind, TypedList};
use storr::types::{
    check_label_consistency, check_structural_consistency, check_structural_consistency_report,
    FieldMarker, ListMarker, ViolationKind,
};
use storr::{
    BucketKind, EnforcementMode, Record, SchemaDefinition, Store, StoreConfig, StoreError,
    TypeError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const PERSON: &[(&str, FieldMarker)] = &[
    ("name", FieldMarker::scalar(ScalarKind::String)),
    ("age", FieldMarker::scalar(ScalarKind::Int)),
    ("father", FieldMarker::reference("lxp")),
    ("children", FieldMarker::list(ListMarker::reference("person"))),
    ("nicknames", FieldMarker::list(ListMarker::base(ScalarKind::String))),
];

fn setup_store(enforcement: EnforcementMode) -> (TempDir, Store) {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig::new(tmp.path())
        .with_sync_writes(false)
        .with_enforcement(enforcement);
    let store = Store::open(config).unwrap();
    (tmp, store)
}

fn empty_people() -> TypedList {
    TypedList::new(ElementKind::Reference)
}

fn empty_strings() -> TypedList {
    TypedList::new(ElementKind::Scalar(ScalarKind::String))
}

// =============================================================================
// Structural Rejection
// =============================================================================

/// Scenario B: `age` declared INT, stored as a string.
#[test]
fn test_string_in_int_field_is_rejected() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("age", "INT"))
        .unwrap();

    let record = Record::new().with("age", "forty-two").unwrap();
    assert!(!check_structural_consistency(&store, &record, t));

    let record = Record::new().with("age", 42).unwrap();
    assert!(check_structural_consistency(&store, &record, t));
}

/// A missing required field fails the check and names the field.
#[test]
fn test_missing_required_field_is_rejected() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type(
            "T",
            &SchemaDefinition::new().field("a", "string").field("b", "double"),
        )
        .unwrap();

    let record = Record::new().with("a", "x").unwrap().with("c", 1).unwrap();
    let report = check_structural_consistency_report(&store, &record, t);
    assert!(!report.is_consistent());

    let violation = report.violation.unwrap();
    assert_eq!(violation.field.as_deref(), Some("b"));
    assert_eq!(violation.kind, ViolationKind::MissingField);
    assert_eq!(report.present_fields, vec!["a".to_string(), "c".to_string()]);
}

/// The check is deterministic.
#[test]
fn test_check_is_deterministic() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("n", "long"))
        .unwrap();
    let good = Record::new().with("n", 5).unwrap();
    let bad = Record::new().with("n", 5.0).unwrap();

    for _ in 0..50 {
        assert!(check_structural_consistency(&store, &good, t));
        assert!(!check_structural_consistency(&store, &bad, t));
    }
}

// =============================================================================
// Empty-List Leniency
// =============================================================================

/// An empty list is consistent with every declared list type.
#[test]
fn test_empty_list_satisfies_any_list_type() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    store.register_type("place", &SchemaDefinition::new()).unwrap();

    for (i, descriptor) in ["[int]", "[string]", "[boolean]", "[place]", "[lxp]"]
        .iter()
        .enumerate()
    {
        let t = store
            .register_type(
                &format!("holder{}", i),
                &SchemaDefinition::new().field("xs", *descriptor),
            )
            .unwrap();
        for element in [
            ElementKind::Reference,
            ElementKind::Scalar(ScalarKind::Int),
            ElementKind::Scalar(ScalarKind::Double),
        ] {
            let record = Record::new().with("xs", TypedList::new(element)).unwrap();
            assert!(
                check_structural_consistency(&store, &record, t),
                "empty [{}] list against {}",
                element,
                descriptor
            );
        }
    }
}

/// A non-empty list must match its declared element type.
#[test]
fn test_non_empty_list_is_checked() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("xs", "[int]"))
        .unwrap();

    let ints = TypedList::from_values(ElementKind::Scalar(ScalarKind::Int), [1, 2]).unwrap();
    let doubles = TypedList::from_values(ElementKind::Scalar(ScalarKind::Double), [1.0]).unwrap();
    assert!(check_structural_consistency(
        &store,
        &Record::new().with("xs", ints).unwrap(),
        t
    ));
    assert!(!check_structural_consistency(
        &store,
        &Record::new().with("xs", doubles).unwrap(),
        t
    ));
}

// =============================================================================
// References
// =============================================================================

/// Reference lists are checked element by element against the referends.
#[test]
fn test_reference_list_checks_referends() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let person = store.register_declaration("person", PERSON).unwrap();
    let people = store
        .make_repository("census")
        .unwrap()
        .make_bucket("people", BucketKind::DirectoryBacked, None)
        .unwrap();

    let mut anything = Record::new().with("x", 1).unwrap();
    let anything_id = people.make_persistent(&mut anything).unwrap();

    let mut child = Record::new()
        .with("name", "Ada")
        .unwrap()
        .with("age", 8)
        .unwrap()
        .with("father", people.reference_to(anything_id))
        .unwrap()
        .with("children", empty_people())
        .unwrap()
        .with("nicknames", empty_strings())
        .unwrap();
    let child_id = people.make_persistent(&mut child).unwrap();
    assert!(check_structural_consistency(&store, &child, person));

    let parent = |children: TypedList| {
        Record::new()
            .with("name", "Byron")
            .unwrap()
            .with("age", 36)
            .unwrap()
            .with("father", people.reference_to(anything_id))
            .unwrap()
            .with("children", children)
            .unwrap()
            .with("nicknames", empty_strings())
            .unwrap()
    };

    let good = parent(TypedList::of_references([people.reference_to(child_id)]));
    assert!(check_structural_consistency(&store, &good, person));

    // The referend exists but is not a person.
    let not_a_person = parent(TypedList::of_references([people.reference_to(anything_id)]));
    assert!(!check_structural_consistency(&store, &not_a_person, person));

    // The referend does not exist.
    let dangling = parent(TypedList::of_references([people.reference_to(9_999)]));
    assert!(!check_structural_consistency(&store, &dangling, person));
}

/// A reference field must hold something that resolves.
#[test]
fn test_reference_field_must_resolve() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("other", "lxp"))
        .unwrap();

    for value in ["", "no-slashes", "a/b/notanumber", "missing/bucket/1"] {
        let record = Record::new().with("other", value).unwrap();
        assert!(!check_structural_consistency(&store, &record, t), "{}", value);
    }
    let record = Record::new().with("other", 3).unwrap();
    assert!(!check_structural_consistency(&store, &record, t));
}

// =============================================================================
// Declarations
// =============================================================================

/// Derived schemas match the declaration table.
#[test]
fn test_declaration_registers_expected_schema() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let id = store.register_declaration("person", PERSON).unwrap();
    let person = store.reference_type_by_id(id).unwrap();

    let descriptors: Vec<_> = person
        .fields()
        .iter()
        .map(|f| (f.name(), f.descriptor()))
        .collect();
    assert_eq!(
        descriptors,
        vec![
            ("name", "string"),
            ("age", "int"),
            ("father", "lxp"),
            ("children", "[person]"),
            ("nicknames", "[string]"),
        ]
    );
}

/// Conflicting markers are a declaration error, not a silent choice.
#[test]
fn test_conflicting_declaration_is_reported() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let table = [(
        "kids",
        FieldMarker::list(ListMarker::base(ScalarKind::Int).with_reference("person")),
    )];
    let err = store.register_declaration("broken", &table).unwrap_err();
    assert!(matches!(err, StoreError::Type(TypeError::Declaration { .. })));
    assert!(store.reference_type_by_name("broken").is_err());
}

/// Registering a name twice fails and keeps the first schema.
#[test]
fn test_duplicate_registration() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let first = store
        .register_type("T", &SchemaDefinition::new().field("a", "int"))
        .unwrap();
    let err = store
        .register_type("T", &SchemaDefinition::new().field("b", "int"))
        .unwrap_err();
    assert_eq!(err.code(), "STORR_TYPE_ALREADY_REGISTERED");
    assert_eq!(store.reference_type_by_name("T").unwrap().id(), first);
    assert!(store.reference_type_by_id(first).unwrap().field("a").is_some());
}

/// Registered types and their ids survive reopen.
#[test]
fn test_types_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let id = {
        let store = Store::open_at(tmp.path()).unwrap();
        store.register_declaration("person", PERSON).unwrap()
    };

    let store = Store::open_at(tmp.path()).unwrap();
    let person = store.reference_type_by_name("person").unwrap();
    assert_eq!(person.id(), id);
    assert_eq!(
        store.parse_type_descriptor("[person]").unwrap(),
        storr::types::TypeVariant::ReferenceList(id)
    );
}

// =============================================================================
// Label Consistency
// =============================================================================

/// Unlabelled and same-labelled records pass the fast path.
#[test]
fn test_label_fast_path() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("a", "int"))
        .unwrap();
    assert!(check_label_consistency(&store, &Record::new(), t));
    assert!(check_label_consistency(&store, &Record::with_type_label(t), t));
}

/// The fallback compares the labelled schema with the expected schema.
///
/// Two types with different fields must not be reported equivalent even
/// though each is, trivially, equivalent to itself.
#[test]
fn test_label_fallback_compares_two_schemas() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let v1 = store
        .register_type("v1", &SchemaDefinition::new().field("a", "int"))
        .unwrap();
    let v2 = store
        .register_type("v2", &SchemaDefinition::new().field("a", "INT"))
        .unwrap();
    let other = store
        .register_type("other", &SchemaDefinition::new().field("b", "string"))
        .unwrap();

    assert!(check_label_consistency(&store, &Record::with_type_label(v2), v1));
    assert!(!check_label_consistency(&store, &Record::with_type_label(other), v1));
    assert!(!check_label_consistency(&store, &Record::with_type_label(v1), other));
}

// =============================================================================
// Enforcement
// =============================================================================

/// Advisory buckets write non-conforming records.
#[test]
fn test_advisory_bucket_accepts_violations() {
    let (_tmp, store) = setup_store(EnforcementMode::Advisory);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("age", "int"))
        .unwrap();
    let bucket = store
        .make_repository("r")
        .unwrap()
        .make_bucket("typed", BucketKind::DirectoryBacked, Some(t))
        .unwrap();

    let mut record = Record::new().with("age", "old").unwrap();
    let id = bucket.make_persistent(&mut record).unwrap();
    assert_eq!(bucket.get_by_id(id).unwrap().get_string("age").unwrap(), "old");
}

/// Strict buckets reject non-conforming records, including records
/// labelled with an incompatible type.
#[test]
fn test_strict_bucket_rejects_violations() {
    let (_tmp, store) = setup_store(EnforcementMode::Strict);
    let t = store
        .register_type("T", &SchemaDefinition::new().field("age", "int"))
        .unwrap();
    let u = store
        .register_type("U", &SchemaDefinition::new().field("name", "string"))
        .unwrap();
    let bucket = store
        .make_repository("r")
        .unwrap()
        .make_bucket("typed", BucketKind::DirectoryBacked, Some(t))
        .unwrap();

    let mut wrong_kind = Record::new().with("age", "old").unwrap();
    assert!(matches!(
        bucket.make_persistent(&mut wrong_kind),
        Err(StoreError::TypeViolation { .. })
    ));

    let mut wrong_label = Record::with_type_label(u).with("age", 3).unwrap();
    assert!(matches!(
        bucket.make_persistent(&mut wrong_label),
        Err(StoreError::TypeViolation { .. })
    ));

    let mut good = Record::with_type_label(t).with("age", 3).unwrap();
    bucket.make_persistent(&mut good).unwrap();
    assert_eq!(bucket.size().unwrap(), 1);
}

/// The enforced type is remembered across reopen.
#[test]
fn test_enforced_type_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let t = {
        let store = Store::open_at(tmp.path()).unwrap();
        let t = store
            .register_type("T", &SchemaDefinition::new().field("age", "int"))
            .unwrap();
        store
            .make_repository("r")
            .unwrap()
            .make_bucket("typed", BucketKind::DirectoryBacked, Some(t))
            .unwrap();
        t
    };

    let store = Store::open_at(tmp.path()).unwrap();
    let bucket = store.get_repository("r").unwrap().get_bucket("typed").unwrap();
    let enforced = bucket.enforced_type().unwrap();
    assert_eq!(enforced.id, t);
    assert_eq!(enforced.name, "T");
}
