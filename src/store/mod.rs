//! # Store
//!
//! Durable storage of records: the `Store` root, its repositories, and
//! their buckets, over a directory tree with one file per record.

pub mod backend;
pub mod bucket;
mod cache;
pub mod config;
pub mod errors;
pub mod ids;
pub mod local;
pub mod metadata;
pub mod repository;
#[allow(clippy::module_inception)]
pub mod store;

pub use backend::StorageBackend;
pub use bucket::{Bucket, BucketIter, BucketKind};
pub use config::{EnforcementMode, StoreConfig, DEFAULT_CACHE_CAPACITY};
pub use errors::{StoreError, StoreResult};
pub use ids::IdAllocator;
pub use local::LocalBackend;
pub use metadata::{BucketManifest, EnforcedType, StoreManifest};
pub use repository::Repository;
pub use store::Store;
