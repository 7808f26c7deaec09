//! The store
//!
//! A `Store` owns one root directory, one record id allocator, and one
//! type registry. Nothing is process-global: two stores opened over
//! different roots share no state.
//!
//! On-disk layout:
//!
//! ```text
//! <root>/
//!   store.json                       store manifest
//!   types/type_names/<id>            type name records
//!   types/type_reps/<id>             type schema records
//!   repositories/<repo>/<bucket>/
//!     .bucket.json                   bucket manifest
//!     <id>                           one record per file
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use uuid::Uuid;

use super::backend::StorageBackend;
use super::bucket::{BucketInner, BucketKind};
use super::config::StoreConfig;
use super::errors::{StoreError, StoreResult};
use super::ids::IdAllocator;
use super::local::LocalBackend;
use super::metadata::{read_json, write_json, BucketManifest, EnforcedType, StoreManifest};
use super::repository::{list_dirs, Repository};
use crate::observability::{log_event_with_fields, Event};
use crate::record::Record;
use crate::reference::StoreReference;
use crate::types::{
    check_label_consistency, check_structural_consistency, FieldMarker, ReferenceType,
    SchemaDefinition, TypeError, TypeRegistry, TypeVariant,
};

#[derive(Debug, Default)]
struct OpenBuckets {
    /// Buckets opened so far, keyed by (repository, bucket)
    by_key: HashMap<(String, String), Arc<BucketInner>>,
    /// Repositories whose directories are being removed
    deleting: HashSet<String>,
}

/// An open store.
///
/// Cloning a `Store` yields another handle to the same store.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    config: StoreConfig,
    manifest: StoreManifest,
    ids: IdAllocator,
    types: RwLock<TypeRegistry>,
    buckets: Mutex<OpenBuckets>,
    /// Serializes creation and deletion of repositories and buckets
    lifecycle: Mutex<()>,
}

impl Store {
    /// Opens the store described by `config`, creating it if the root
    /// holds no store yet.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let repositories_dir = config.repositories_dir();
        fs::create_dir_all(&repositories_dir)
            .map_err(|e| StoreError::io(repositories_dir.display(), e))?;

        let manifest_path = config.manifest_path();
        let manifest = match read_json::<StoreManifest>(&manifest_path)? {
            Some(manifest) => {
                manifest.validate(&manifest_path)?;
                manifest
            }
            None => {
                let manifest = StoreManifest::new();
                write_json(&manifest_path, &manifest, config.sync_writes)?;
                manifest
            }
        };

        let types = TypeRegistry::open(&config.types_dir(), config.sync_writes)?;
        let highest = highest_stored_id(&repositories_dir)?;

        let inner = StoreInner {
            ids: IdAllocator::starting_at(highest.saturating_add(1)),
            types: RwLock::new(types),
            buckets: Mutex::new(OpenBuckets::default()),
            lifecycle: Mutex::new(()),
            manifest,
            config,
        };

        log_event_with_fields(
            Event::StoreOpened,
            &[
                ("instance_id", &inner.manifest.instance_id.to_string()),
                ("next_id", &inner.ids.peek().to_string()),
                ("root", &inner.config.root.display().to_string()),
            ],
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Opens the store at `root` with the default configuration.
    pub fn open_at(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(root))
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    /// Identity of the store root, stable across reopen
    pub fn instance_id(&self) -> Uuid {
        self.inner.manifest.instance_id
    }

    // ========================================================================
    // Repositories
    // ========================================================================

    /// Creates a repository.
    pub fn make_repository(&self, name: &str) -> StoreResult<Repository> {
        validate_name("repository", name)?;
        let _guard = self.inner.lock_lifecycle()?;

        let dir = self.inner.repository_dir(name);
        if dir.exists() {
            return Err(StoreError::RepositoryExists(name.to_string()));
        }
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(dir.display(), e))?;

        log_event_with_fields(Event::RepositoryCreated, &[("repository", name)]);
        Ok(self.repository_handle(name))
    }

    /// Opens an existing repository.
    pub fn get_repository(&self, name: &str) -> StoreResult<Repository> {
        if !self.repository_exists(name) {
            return Err(StoreError::RepositoryNotFound(name.to_string()));
        }
        Ok(self.repository_handle(name))
    }

    pub fn repository_exists(&self, name: &str) -> bool {
        validate_name("repository", name).is_ok() && self.inner.repository_dir(name).is_dir()
    }

    /// Deletes a repository and every bucket in it.
    ///
    /// Open handles to its buckets fail with `BucketNotFound` afterwards.
    pub fn delete_repository(&self, name: &str) -> StoreResult<()> {
        validate_name("repository", name)?;
        let _guard = self.inner.lock_lifecycle()?;

        let dir = self.inner.repository_dir(name);
        if !dir.is_dir() {
            return Err(StoreError::RepositoryNotFound(name.to_string()));
        }

        // Bucket write locks are taken after the map lock is released; a
        // writer may be resolving references through the map. Buckets of a
        // repository being deleted are not loaded again meanwhile.
        let open: Vec<_> = {
            let mut buckets = self.inner.lock_buckets()?;
            buckets.deleting.insert(name.to_string());
            let keys: Vec<_> = buckets
                .by_key
                .keys()
                .filter(|(repository, _)| repository == name)
                .cloned()
                .collect();
            keys.iter().filter_map(|key| buckets.by_key.remove(key)).collect()
        };

        let removed = open
            .iter()
            .try_for_each(|bucket| bucket.mark_deleted())
            .and_then(|()| fs::remove_dir_all(&dir).map_err(|e| StoreError::io(dir.display(), e)));
        self.inner.lock_buckets()?.deleting.remove(name);
        removed?;

        log_event_with_fields(Event::RepositoryDeleted, &[("repository", name)]);
        Ok(())
    }

    /// Names of all repositories, sorted
    pub fn repository_names(&self) -> StoreResult<Vec<String>> {
        list_dirs(&self.inner.config.repositories_dir())
    }

    fn repository_handle(&self, name: &str) -> Repository {
        Repository::new(name, Arc::downgrade(&self.inner))
    }

    // ========================================================================
    // Records and references
    // ========================================================================

    /// Loads the record a reference points at.
    pub fn resolve(&self, reference: &StoreReference) -> StoreResult<Record> {
        self.get_repository(reference.repository())?
            .get_bucket(reference.bucket())?
            .get_by_id(reference.id())
    }

    /// The id the next freshly persisted record will receive
    pub fn peek_next_id(&self) -> u64 {
        self.inner.ids.peek()
    }

    pub(crate) fn allocate_id(&self) -> StoreResult<u64> {
        self.inner
            .ids
            .allocate()
            .ok_or_else(|| StoreError::Internal("record id space exhausted".into()))
    }

    pub(crate) fn observe_id(&self, id: u64) {
        self.inner.ids.observe(id)
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Registers a reference type and returns its id.
    pub fn register_type(&self, name: &str, definition: &SchemaDefinition) -> StoreResult<u64> {
        let mut types = self.inner.types.write().map_err(|_| StoreError::poisoned())?;
        Ok(types.register(name, definition)?)
    }

    /// Registers a reference type derived from a declaration table.
    pub fn register_declaration(
        &self,
        name: &str,
        declaration: &[(&str, FieldMarker)],
    ) -> StoreResult<u64> {
        let mut types = self.inner.types.write().map_err(|_| StoreError::poisoned())?;
        Ok(types.register_declaration(name, declaration)?)
    }

    pub fn reference_type_by_id(&self, id: u64) -> StoreResult<ReferenceType> {
        let types = self.inner.types.read().map_err(|_| StoreError::poisoned())?;
        types
            .by_id(id)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(format!("#{}", id)).into())
    }

    pub fn reference_type_by_name(&self, name: &str) -> StoreResult<ReferenceType> {
        let types = self.inner.types.read().map_err(|_| StoreError::poisoned())?;
        types
            .by_name(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(name.to_string()).into())
    }

    /// Names of all registered types, including `lxp`
    pub fn type_names(&self) -> StoreResult<Vec<String>> {
        let types = self.inner.types.read().map_err(|_| StoreError::poisoned())?;
        Ok(types.names().into_iter().map(str::to_string).collect())
    }

    /// Parses a type descriptor against this store's registry.
    pub fn parse_type_descriptor(&self, descriptor: &str) -> StoreResult<TypeVariant> {
        let types = self.inner.types.read().map_err(|_| StoreError::poisoned())?;
        Ok(types.parse_type_descriptor(descriptor))
    }

    /// See `types::check_structural_consistency`
    pub fn check_structural_consistency(&self, record: &Record, type_id: u64) -> bool {
        check_structural_consistency(self, record, type_id)
    }

    /// See `types::check_label_consistency`
    pub fn check_label_consistency(&self, record: &Record, expected_type_id: u64) -> bool {
        check_label_consistency(self, record, expected_type_id)
    }
}

impl StoreInner {
    pub(crate) fn repository_dir(&self, name: &str) -> PathBuf {
        self.config.repositories_dir().join(name)
    }

    fn lock_lifecycle(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.lifecycle.lock().map_err(|_| StoreError::poisoned())
    }

    fn lock_buckets(&self) -> StoreResult<MutexGuard<'_, OpenBuckets>> {
        self.buckets.lock().map_err(|_| StoreError::poisoned())
    }

    fn repository_dir_checked(&self, repository: &str) -> StoreResult<PathBuf> {
        let dir = self.repository_dir(repository);
        if !dir.is_dir() {
            return Err(StoreError::RepositoryNotFound(repository.to_string()));
        }
        Ok(dir)
    }

    pub(crate) fn create_bucket(
        &self,
        repository: &str,
        name: &str,
        kind: BucketKind,
        enforced_type: Option<u64>,
    ) -> StoreResult<Arc<BucketInner>> {
        let _guard = self.lock_lifecycle()?;
        let dir = self.repository_dir_checked(repository)?.join(name);
        if dir.exists() {
            return Err(StoreError::BucketExists {
                repository: repository.to_string(),
                bucket: name.to_string(),
            });
        }

        let enforced = match enforced_type {
            Some(id) => {
                let types = self.types.read().map_err(|_| StoreError::poisoned())?;
                let reference_type = types
                    .by_id(id)
                    .ok_or_else(|| TypeError::UnknownType(format!("#{}", id)))?;
                Some(EnforcedType {
                    id,
                    name: reference_type.name().to_string(),
                })
            }
            None => None,
        };

        let manifest = BucketManifest::new(kind, enforced);
        let inner = Arc::new(BucketInner::create(
            repository,
            name,
            dir,
            manifest,
            self.config.sync_writes,
            self.config.record_cache_capacity(),
        )?);

        self.lock_buckets()?
            .by_key
            .insert((repository.to_string(), name.to_string()), Arc::clone(&inner));

        log_event_with_fields(
            Event::BucketCreated,
            &[("bucket", name), ("repository", repository)],
        );
        Ok(inner)
    }

    pub(crate) fn open_bucket(&self, repository: &str, name: &str) -> StoreResult<Arc<BucketInner>> {
        let dir = self.repository_dir_checked(repository)?.join(name);
        let mut buckets = self.lock_buckets()?;
        if buckets.deleting.contains(repository) {
            return Err(StoreError::RepositoryNotFound(repository.to_string()));
        }
        let key = (repository.to_string(), name.to_string());
        if let Some(inner) = buckets.by_key.get(&key) {
            if inner.is_present() {
                return Ok(Arc::clone(inner));
            }
            // Its directory was removed from under it.
            buckets.by_key.remove(&key);
        }

        let inner = BucketInner::load(
            repository,
            name,
            dir,
            self.config.sync_writes,
            self.config.record_cache_capacity(),
        )?
        .ok_or_else(|| StoreError::BucketNotFound {
            repository: repository.to_string(),
            bucket: name.to_string(),
        })?;
        let inner = Arc::new(inner);
        buckets.by_key.insert(key, Arc::clone(&inner));
        Ok(inner)
    }

    pub(crate) fn delete_bucket(&self, repository: &str, name: &str) -> StoreResult<()> {
        let _guard = self.lock_lifecycle()?;
        let inner = self.open_bucket(repository, name)?;
        inner.destroy()?;
        self.lock_buckets()?
            .by_key
            .remove(&(repository.to_string(), name.to_string()));

        log_event_with_fields(
            Event::BucketDeleted,
            &[("bucket", name), ("repository", inner.repository())],
        );
        Ok(())
    }
}

/// Checks a repository or bucket name.
///
/// Names become directory names and parts of encoded references, so they
/// must be non-empty, must not start with `.`, and must not contain `/`,
/// `\` or NUL.
pub(crate) fn validate_name(what: &'static str, name: &str) -> StoreResult<()> {
    let illegal = name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if illegal {
        return Err(StoreError::IllegalName {
            what,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Highest record id stored in any bucket under `repositories_dir`, or 0.
fn highest_stored_id(repositories_dir: &Path) -> StoreResult<u64> {
    let mut highest = 0;
    for repository in list_dirs(repositories_dir)? {
        let repository_dir = repositories_dir.join(&repository);
        for bucket in list_dirs(&repository_dir)? {
            let backend = LocalBackend::existing(repository_dir.join(&bucket), false);
            for key in backend.list()? {
                if let Ok(id) = key.parse::<u64>() {
                    highest = highest.max(id);
                }
            }
        }
    }
    Ok(highest)
}
