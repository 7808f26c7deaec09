//! Buckets
//!
//! A bucket is a named, durable collection of records inside a
//! repository. A directory-backed bucket stores each record in its own
//! file named by the record's decimal id.
//!
//! Writes to one bucket are serialized by a per-bucket mutex that is held
//! from id allocation through the type check, the atomic file write, and
//! the cache insert. Reads never take it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::{Deserialize, Serialize};

use super::backend::StorageBackend;
use super::cache::RecordCache;
use super::config::EnforcementMode;
use super::errors::{StoreError, StoreResult};
use super::local::LocalBackend;
use super::metadata::{read_json, write_json, BucketManifest, EnforcedType, BUCKET_MANIFEST};
use super::store::{Store, StoreInner};
use crate::observability::{log_event_with_fields, Event};
use crate::record::{codec, Record, RecordError};
use crate::reference::StoreReference;
use crate::types::{check_label_consistency, check_structural_consistency_report};

/// Storage kind of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BucketKind {
    /// One file per record in the bucket's directory
    DirectoryBacked,
}

#[derive(Debug)]
pub(crate) struct BucketInner {
    repository: String,
    name: String,
    dir: PathBuf,
    manifest: BucketManifest,
    backend: LocalBackend,
    write_lock: Mutex<()>,
    cache: Option<RwLock<RecordCache>>,
    deleted: AtomicBool,
}

impl BucketInner {
    /// Creates the bucket directory and manifest.
    pub(crate) fn create(
        repository: &str,
        name: &str,
        dir: PathBuf,
        manifest: BucketManifest,
        sync: bool,
        cache_capacity: Option<usize>,
    ) -> StoreResult<Self> {
        write_json(&dir.join(BUCKET_MANIFEST), &manifest, sync)?;
        Ok(Self::new(repository, name, dir, manifest, sync, cache_capacity))
    }

    /// Loads an existing bucket, or `None` if `dir` holds no bucket.
    pub(crate) fn load(
        repository: &str,
        name: &str,
        dir: PathBuf,
        sync: bool,
        cache_capacity: Option<usize>,
    ) -> StoreResult<Option<Self>> {
        let manifest: Option<BucketManifest> = read_json(&dir.join(BUCKET_MANIFEST))?;
        Ok(manifest.map(|m| Self::new(repository, name, dir, m, sync, cache_capacity)))
    }

    fn new(
        repository: &str,
        name: &str,
        dir: PathBuf,
        manifest: BucketManifest,
        sync: bool,
        cache_capacity: Option<usize>,
    ) -> Self {
        Self {
            repository: repository.to_string(),
            name: name.to_string(),
            backend: LocalBackend::existing(dir.clone(), sync),
            dir,
            manifest,
            write_lock: Mutex::new(()),
            cache: cache_capacity.map(|capacity| RwLock::new(RecordCache::new(capacity))),
            deleted: AtomicBool::new(false),
        }
    }

    pub(crate) fn repository(&self) -> &str {
        &self.repository
    }

    /// Whether the bucket is still on disk. A bucket whose manifest has
    /// disappeared is marked deleted.
    pub(crate) fn is_present(&self) -> bool {
        if self.deleted.load(Ordering::Acquire) {
            return false;
        }
        if self.dir.join(BUCKET_MANIFEST).is_file() {
            return true;
        }
        self.deleted.store(true, Ordering::Release);
        false
    }

    /// Marks the bucket deleted and removes its directory.
    ///
    /// Waits for an in-flight write to finish, so no write can land after
    /// the directory is gone.
    pub(crate) fn destroy(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::poisoned())?;
        self.deleted.store(true, Ordering::Release);
        if let Some(cache) = &self.cache {
            cache.write().map_err(|_| StoreError::poisoned())?.clear();
        }
        self.backend.destroy()
    }

    /// Marks the bucket deleted without touching disk; used when the
    /// repository directory is removed as a whole.
    pub(crate) fn mark_deleted(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::poisoned())?;
        self.deleted.store(true, Ordering::Release);
        Ok(())
    }
}

/// Handle to a bucket.
///
/// Handles are cheap to clone; all handles to the same bucket share one
/// write lock and one identity cache. A handle to a deleted bucket fails
/// every operation with `BucketNotFound`.
#[derive(Debug, Clone)]
pub struct Bucket {
    inner: Arc<BucketInner>,
    store: Weak<StoreInner>,
}

impl Bucket {
    pub(crate) fn from_inner(inner: Arc<BucketInner>, store: Weak<StoreInner>) -> Self {
        Self { inner, store }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn repository_name(&self) -> &str {
        &self.inner.repository
    }

    pub fn kind(&self) -> BucketKind {
        self.inner.manifest.kind
    }

    /// The reference type this bucket checks records against, if any
    pub fn enforced_type(&self) -> Option<&EnforcedType> {
        self.inner.manifest.enforced_type.as_ref()
    }

    /// Directory holding this bucket's records
    pub fn path(&self) -> &Path {
        &self.inner.dir
    }

    /// A reference to the record with `id` in this bucket
    pub fn reference_to(&self, id: u64) -> StoreReference {
        StoreReference::from_parts(&self.inner.repository, &self.inner.name, id)
    }

    /// Persists `record` and returns its id.
    ///
    /// A record without an id is given a fresh one from the store. A
    /// record that already has an id keeps it, unless a record with that id
    /// is already stored here (`DuplicateId`). The id is assigned to
    /// `record` only once the write has succeeded.
    ///
    /// If the bucket enforces a reference type, the record is checked
    /// first. In advisory mode a violation is logged and the record is
    /// written anyway; in strict mode the write fails with `TypeViolation`.
    pub fn make_persistent(&self, record: &mut Record) -> StoreResult<u64> {
        let store = self.store()?;
        self.ensure_live()?;

        let _guard = self
            .inner
            .write_lock
            .lock()
            .map_err(|_| StoreError::poisoned())?;
        self.ensure_live()?;

        let id = match record.id() {
            Some(id) => {
                if self.inner.backend.exists(&id.to_string()) {
                    return Err(StoreError::DuplicateId {
                        repository: self.inner.repository.clone(),
                        bucket: self.inner.name.clone(),
                        id,
                    });
                }
                store.observe_id(id);
                id
            }
            None => store.allocate_id()?,
        };

        if let Some(enforced) = &self.inner.manifest.enforced_type {
            self.enforce(&store, record, enforced)?;
        }

        let data = codec::encode(record, id)?;
        if let Err(e) = self.inner.backend.write(&id.to_string(), &data) {
            // Only a deletion removes the directory.
            if !self.inner.dir.is_dir() {
                self.inner.deleted.store(true, Ordering::Release);
                return Err(self.gone());
            }
            return Err(e);
        }
        record.assign_id(id)?;

        if let Some(cache) = &self.inner.cache {
            cache
                .write()
                .map_err(|_| StoreError::poisoned())?
                .insert(id, record.clone());
        }

        log_event_with_fields(
            Event::RecordPersisted,
            &[
                ("bucket", &self.inner.name),
                ("id", &id.to_string()),
                ("repository", &self.inner.repository),
            ],
        );
        Ok(id)
    }

    /// Loads the record stored under `id`.
    pub fn get_by_id(&self, id: u64) -> StoreResult<Record> {
        self.store()?;
        self.ensure_live()?;

        if let Some(cache) = &self.inner.cache {
            let cache = cache.read().map_err(|_| StoreError::poisoned())?;
            if let Some(record) = cache.get(id) {
                return Ok(record.clone());
            }
        }

        let key = id.to_string();
        let data = self
            .inner
            .backend
            .read(&key)?
            .ok_or_else(|| self.not_found(id))?;
        let record = codec::decode(&data).map_err(|e| match e {
            RecordError::ChecksumMismatch { .. } => StoreError::Corruption {
                path: self.inner.dir.join(&key).display().to_string(),
                reason: e.to_string(),
            },
            other => StoreError::Record(other),
        })?;
        if record.id() != Some(id) {
            return Err(StoreError::Corruption {
                path: self.inner.dir.join(&key).display().to_string(),
                reason: format!("file holds record {:?}", record.id()),
            });
        }

        if let Some(cache) = &self.inner.cache {
            cache
                .write()
                .map_err(|_| StoreError::poisoned())?
                .insert(id, record.clone());
        }
        Ok(record)
    }

    pub fn contains(&self, id: u64) -> StoreResult<bool> {
        self.store()?;
        self.ensure_live()?;
        Ok(self.inner.backend.exists(&id.to_string()))
    }

    /// Ids of all stored records, ascending
    pub fn ids(&self) -> StoreResult<Vec<u64>> {
        self.ensure_live()?;
        let mut ids: Vec<u64> = self
            .inner
            .backend
            .list()?
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Number of stored records
    pub fn size(&self) -> StoreResult<usize> {
        self.ids().map(|ids| ids.len())
    }

    /// Iterates over every stored record.
    ///
    /// The ids are listed when `iter` is called and each record is loaded
    /// as the iterator reaches it. Calling `iter` again starts over and
    /// sees records written since.
    pub fn iter(&self) -> BucketIter {
        match self.ids() {
            Ok(ids) => BucketIter {
                bucket: self.clone(),
                ids: ids.into_iter(),
                error: None,
            },
            Err(e) => BucketIter {
                bucket: self.clone(),
                ids: Vec::new().into_iter(),
                error: Some(e),
            },
        }
    }

    /// Drops every cached record.
    pub fn invalidate_cache(&self) -> StoreResult<()> {
        if let Some(cache) = &self.inner.cache {
            cache.write().map_err(|_| StoreError::poisoned())?.clear();
        }
        Ok(())
    }

    /// Number of cached records
    pub fn cached_len(&self) -> usize {
        self.inner
            .cache
            .as_ref()
            .and_then(|c| c.read().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.deleted.load(Ordering::Acquire)
    }

    fn enforce(&self, store: &Store, record: &Record, enforced: &EnforcedType) -> StoreResult<()> {
        let report = check_structural_consistency_report(store, record, enforced.id);
        let detail = match &report.violation {
            Some(violation) => violation.to_string(),
            None if !check_label_consistency(store, record, enforced.id) => format!(
                "type label {} is not compatible",
                record.type_label().map(|l| l.to_string()).unwrap_or_default()
            ),
            None => return Ok(()),
        };

        log_event_with_fields(
            Event::EnforcedTypeViolation,
            &[
                ("bucket", &self.inner.name),
                ("detail", &detail),
                ("repository", &self.inner.repository),
                ("type", &enforced.name),
            ],
        );

        match store.config().enforcement {
            EnforcementMode::Advisory => Ok(()),
            EnforcementMode::Strict => Err(StoreError::TypeViolation {
                type_name: enforced.name.clone(),
                detail,
            }),
        }
    }

    fn store(&self) -> StoreResult<Store> {
        self.store
            .upgrade()
            .map(Store::from_inner)
            .ok_or(StoreError::StoreClosed)
    }

    fn ensure_live(&self) -> StoreResult<()> {
        if self.is_deleted() {
            return Err(self.gone());
        }
        Ok(())
    }

    fn gone(&self) -> StoreError {
        StoreError::BucketNotFound {
            repository: self.inner.repository.clone(),
            bucket: self.inner.name.clone(),
        }
    }

    fn not_found(&self, id: u64) -> StoreError {
        StoreError::RecordNotFound {
            repository: self.inner.repository.clone(),
            bucket: self.inner.name.clone(),
            id,
        }
    }
}

/// Lazy iterator over a bucket's records, in ascending id order
#[derive(Debug)]
pub struct BucketIter {
    bucket: Bucket,
    ids: std::vec::IntoIter<u64>,
    error: Option<StoreError>,
}

impl Iterator for BucketIter {
    type Item = StoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }
        for id in self.ids.by_ref() {
            match self.bucket.get_by_id(id) {
                // Gone since the listing
                Err(StoreError::RecordNotFound { .. }) => continue,
                result => return Some(result),
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a Bucket {
    type Item = StoreResult<Record>;
    type IntoIter = BucketIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
