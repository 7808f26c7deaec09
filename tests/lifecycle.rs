//! Lifecycle Tests
//!
//! Creation and deletion of repositories and buckets:
//! - Deleting a repository cascades to its buckets and their records
//! - Creating something that exists, or using something that does not,
//!   fails with a named error
//! - Handles outliving their store fail with StoreClosed

use std::thread;

use storr::{BucketKind, Record, Store, StoreConfig, StoreError, StoreReference};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, Store) {
    let tmp = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::new(tmp.path()).with_sync_writes(false)).unwrap();
    (tmp, store)
}

// =============================================================================
// Repository Deletion
// =============================================================================

/// Scenario C: a deleted repository no longer exists and its buckets are
/// unreachable.
#[test]
fn test_delete_repository_cascades() {
    let (tmp, store) = setup_store();
    let repo = store.make_repository("census").unwrap();
    let people = repo
        .make_bucket("people", BucketKind::DirectoryBacked, None)
        .unwrap();
    let mut record = Record::new().with("name", "Ada").unwrap();
    let id = people.make_persistent(&mut record).unwrap();
    let reference = people.reference_to(id);

    store.delete_repository("census").unwrap();

    assert!(!store.repository_exists("census"));
    assert!(!repo.exists());
    assert!(!tmp.path().join("repositories").join("census").exists());

    assert!(matches!(
        store.get_repository("census"),
        Err(StoreError::RepositoryNotFound(_))
    ));
    assert!(matches!(
        repo.get_bucket("people"),
        Err(StoreError::RepositoryNotFound(_))
    ));
    assert!(matches!(
        people.get_by_id(id),
        Err(StoreError::BucketNotFound { .. })
    ));
    assert!(matches!(
        people.make_persistent(&mut Record::new()),
        Err(StoreError::BucketNotFound { .. })
    ));
    assert!(store.resolve(&reference).unwrap_err().is_not_found());
}

/// Writers racing a repository deletion never bring it back.
#[test]
fn test_delete_repository_under_concurrent_writers() {
    let (tmp, store) = setup_store();
    let people = store
        .make_repository("census")
        .unwrap()
        .make_bucket("people", BucketKind::DirectoryBacked, None)
        .unwrap();
    let id = people
        .make_persistent(&mut Record::new().with("name", "Ada").unwrap())
        .unwrap();
    let reference = people.reference_to(id);

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let reference = reference.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ = store.resolve(&reference);
                    let _ = store
                        .get_repository("census")
                        .and_then(|repo| repo.get_bucket("people"))
                        .and_then(|bucket| bucket.make_persistent(&mut Record::new()));
                }
            })
        })
        .collect();

    store.delete_repository("census").unwrap();
    for writer in writers {
        writer.join().unwrap();
    }

    assert!(!tmp.path().join("repositories").join("census").exists());
    assert!(!store.repository_exists("census"));
    assert!(store.resolve(&reference).unwrap_err().is_not_found());
}

/// A repository of the same name can be created again, empty.
#[test]
fn test_recreate_deleted_repository() {
    let (_tmp, store) = setup_store();
    let repo = store.make_repository("r").unwrap();
    repo.make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    store.delete_repository("r").unwrap();

    let repo = store.make_repository("r").unwrap();
    assert!(repo.bucket_names().unwrap().is_empty());
    assert!(!repo.bucket_exists("b"));
}

/// Deleting one repository leaves the others alone.
#[test]
fn test_delete_is_scoped() {
    let (_tmp, store) = setup_store();
    let keep = store
        .make_repository("keep")
        .unwrap()
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    let mut record = Record::new().with("x", 1).unwrap();
    let id = keep.make_persistent(&mut record).unwrap();

    store
        .make_repository("drop")
        .unwrap()
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    store.delete_repository("drop").unwrap();

    assert_eq!(store.repository_names().unwrap(), vec!["keep".to_string()]);
    assert_eq!(keep.get_by_id(id).unwrap(), record);
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

#[test]
fn test_duplicate_creation_fails() {
    let (_tmp, store) = setup_store();
    let repo = store.make_repository("r").unwrap();
    assert_eq!(
        store.make_repository("r").unwrap_err().code(),
        "STORR_REPOSITORY_EXISTS"
    );

    repo.make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    assert!(matches!(
        repo.make_bucket("b", BucketKind::DirectoryBacked, None),
        Err(StoreError::BucketExists { .. })
    ));
}

#[test]
fn test_operations_on_missing_things_fail() {
    let (_tmp, store) = setup_store();
    assert!(store.get_repository("ghost").unwrap_err().is_not_found());
    assert!(store.delete_repository("ghost").unwrap_err().is_not_found());

    let repo = store.make_repository("r").unwrap();
    assert!(repo.get_bucket("ghost").unwrap_err().is_not_found());
    assert!(repo.delete_bucket("ghost").unwrap_err().is_not_found());

    let bucket = repo
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    let err = bucket.get_by_id(12345).unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { id: 12345, .. }));
}

/// Resolution distinguishes each missing level.
#[test]
fn test_resolve_failures() {
    let (_tmp, store) = setup_store();
    let bucket = store
        .make_repository("r")
        .unwrap()
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    let id = bucket.make_persistent(&mut Record::new()).unwrap();

    let resolve = |repository: &str, b: &str, id: u64| {
        store.resolve(&StoreReference::new(repository, b, id).unwrap())
    };
    assert!(resolve("r", "b", id).is_ok());
    assert!(matches!(
        resolve("x", "b", id),
        Err(StoreError::RepositoryNotFound(_))
    ));
    assert!(matches!(
        resolve("r", "x", id),
        Err(StoreError::BucketNotFound { .. })
    ));
    assert!(matches!(
        resolve("r", "b", id + 1),
        Err(StoreError::RecordNotFound { .. })
    ));
}

// =============================================================================
// Handles
// =============================================================================

/// Buckets opened through different handles share one identity cache.
#[test]
fn test_handles_share_bucket_state() {
    let (_tmp, store) = setup_store();
    let repo = store.make_repository("r").unwrap();
    let first = repo
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    let second = repo.get_bucket("b").unwrap();

    first
        .make_persistent(&mut Record::new().with("x", 1).unwrap())
        .unwrap();
    assert_eq!(second.cached_len(), 1);
    assert_eq!(second.size().unwrap(), 1);
}

/// Buckets and repositories stop working once the store is dropped.
#[test]
fn test_handles_outliving_store() {
    let (_tmp, store) = setup_store();
    let repo = store.make_repository("r").unwrap();
    let bucket = repo
        .make_bucket("b", BucketKind::DirectoryBacked, None)
        .unwrap();
    drop(store);

    assert!(matches!(
        repo.get_bucket("b"),
        Err(StoreError::StoreClosed)
    ));
    assert!(matches!(bucket.get_by_id(1), Err(StoreError::StoreClosed)));
}

/// Buckets and records are found again after reopen.
#[test]
fn test_reopen_finds_everything() {
    let tmp = TempDir::new().unwrap();
    let (id, record) = {
        let store = Store::open_at(tmp.path()).unwrap();
        let bucket = store
            .make_repository("r")
            .unwrap()
            .make_bucket("b", BucketKind::DirectoryBacked, None)
            .unwrap();
        let mut record = Record::new().with("kept", true).unwrap();
        (bucket.make_persistent(&mut record).unwrap(), record)
    };

    let store = Store::open_at(tmp.path()).unwrap();
    assert_eq!(store.repository_names().unwrap(), vec!["r".to_string()]);
    let repo = store.get_repository("r").unwrap();
    assert_eq!(repo.bucket_names().unwrap(), vec!["b".to_string()]);
    assert_eq!(repo.get_bucket("b").unwrap().get_by_id(id).unwrap(), record);
}
