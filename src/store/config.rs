//! Store configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};

/// What a bucket does with a record that does not satisfy its enforced type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Log the violation and write the record anyway
    #[default]
    Advisory,
    /// Reject the write with `StoreError::TypeViolation`
    Strict,
}

/// Configuration for a `Store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store root directory
    pub root: PathBuf,
    /// fsync record files and their directory on every write
    #[serde(default = "default_true")]
    pub sync_writes: bool,
    /// Handling of enforced-type violations
    #[serde(default)]
    pub enforcement: EnforcementMode,
    /// Keep an id -> record cache per bucket
    #[serde(default = "default_true")]
    pub cache_records: bool,
    /// Most records each bucket's cache holds
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Default number of records cached per bucket
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_writes: true,
            enforcement: EnforcementMode::Advisory,
            cache_records: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path.display(), e))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corruption {
            path: path.display().to_string(),
            reason: format!("invalid store configuration: {}", e),
        })
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_enforcement(mut self, enforcement: EnforcementMode) -> Self {
        self.enforcement = enforcement;
        self
    }

    pub fn with_record_cache(mut self, cache_records: bool) -> Self {
        self.cache_records = cache_records;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Per-bucket cache capacity, or `None` when caching is off
    pub fn record_cache_capacity(&self) -> Option<usize> {
        self.cache_records.then_some(self.cache_capacity)
    }

    /// Directory holding all repositories
    pub fn repositories_dir(&self) -> PathBuf {
        self.root.join("repositories")
    }

    /// Directory holding the persisted type registry
    pub fn types_dir(&self) -> PathBuf {
        self.root.join("types")
    }

    /// Path of the store manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("store.json")
    }
}
