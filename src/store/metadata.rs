//! Store and bucket manifests
//!
//! - `<root>/store.json` identifies a store root
//! - `<bucket dir>/.bucket.json` records a bucket's kind and enforced type

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bucket::BucketKind;
use super::errors::{StoreError, StoreResult};
use super::local::write_atomic;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// File name of a bucket manifest inside the bucket directory
pub const BUCKET_MANIFEST: &str = ".bucket.json";

/// Identity of a store root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format_version: u32,
    pub instance_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl StoreManifest {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            instance_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Checks that this build can read the store.
    pub fn validate(&self, path: &Path) -> StoreResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::Corruption {
                path: path.display().to_string(),
                reason: format!(
                    "unsupported format version {} (expected {})",
                    self.format_version, FORMAT_VERSION
                ),
            });
        }
        Ok(())
    }
}

impl Default for StoreManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Type enforced by a bucket, by id and by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcedType {
    pub id: u64,
    pub name: String,
}

/// Persistent description of a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketManifest {
    pub kind: BucketKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforced_type: Option<EnforcedType>,
    pub created_at: DateTime<Utc>,
}

impl BucketManifest {
    pub fn new(kind: BucketKind, enforced_type: Option<EnforcedType>) -> Self {
        Self {
            kind,
            enforced_type,
            created_at: Utc::now(),
        }
    }
}

/// Reads a JSON manifest, returning `None` if the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path.display(), e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corruption {
            path: path.display().to_string(),
            reason: format!("invalid manifest: {}", e),
        })
}

/// Writes a JSON manifest atomically.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T, sync: bool) -> StoreResult<()> {
    let content = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Corruption {
        path: path.display().to_string(),
        reason: format!("failed to serialize manifest: {}", e),
    })?;
    write_atomic(path, &content, sync, true)
}
