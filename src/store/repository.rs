//! Repositories
//!
//! A repository is a named directory of buckets under the store's
//! `repositories/` directory.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use super::bucket::{Bucket, BucketKind};
use super::errors::{StoreError, StoreResult};
use super::store::{validate_name, StoreInner};

/// Handle to a repository.
///
/// Like a `Bucket`, it refers back to its store weakly; once every
/// `Store` handle is dropped its operations fail with `StoreClosed`.
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    store: Weak<StoreInner>,
}

impl Repository {
    pub(crate) fn new(name: &str, store: Weak<StoreInner>) -> Self {
        Self {
            name: name.to_string(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the repository still exists on disk
    pub fn exists(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.repository_dir(&self.name).is_dir())
    }

    /// Creates a bucket.
    ///
    /// `enforced_type` names a registered reference type that records
    /// written to the bucket are checked against.
    pub fn make_bucket(
        &self,
        name: &str,
        kind: BucketKind,
        enforced_type: Option<u64>,
    ) -> StoreResult<Bucket> {
        let store = self.store()?;
        validate_name("bucket", name)?;
        let inner = store.create_bucket(&self.name, name, kind, enforced_type)?;
        Ok(Bucket::from_inner(inner, Arc::downgrade(&store)))
    }

    /// Opens an existing bucket.
    pub fn get_bucket(&self, name: &str) -> StoreResult<Bucket> {
        let store = self.store()?;
        validate_name("bucket", name)?;
        let inner = store.open_bucket(&self.name, name)?;
        Ok(Bucket::from_inner(inner, Arc::downgrade(&store)))
    }

    pub fn bucket_exists(&self, name: &str) -> bool {
        self.get_bucket(name).is_ok()
    }

    /// Deletes a bucket and every record in it.
    pub fn delete_bucket(&self, name: &str) -> StoreResult<()> {
        let store = self.store()?;
        validate_name("bucket", name)?;
        store.delete_bucket(&self.name, name)
    }

    /// Names of the repository's buckets, sorted
    pub fn bucket_names(&self) -> StoreResult<Vec<String>> {
        let store = self.store()?;
        let dir = self.dir(&store)?;
        list_dirs(&dir)
    }

    fn dir(&self, store: &StoreInner) -> StoreResult<PathBuf> {
        let dir = store.repository_dir(&self.name);
        if !dir.is_dir() {
            return Err(StoreError::RepositoryNotFound(self.name.clone()));
        }
        Ok(dir)
    }

    fn store(&self) -> StoreResult<Arc<StoreInner>> {
        self.store.upgrade().ok_or(StoreError::StoreClosed)
    }
}

/// Names of the non-hidden subdirectories of `dir`, sorted.
pub(crate) fn list_dirs(dir: &std::path::Path) -> StoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir.display(), e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir.display(), e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| StoreError::io(entry.path().display(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
