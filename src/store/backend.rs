//! Storage backend trait

use super::errors::StoreResult;

/// Keyed byte storage behind a bucket or a type registry table.
///
/// Keys are flat file names; a backend owns one directory-like namespace.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Writes `data` under `key`, replacing any previous value atomically
    fn write(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Reads the value under `key`, or `None` if there is none
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Deletes the value under `key`, returning whether it existed
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Checks whether `key` holds a value
    fn exists(&self, key: &str) -> bool;

    /// Lists keys in storage order
    fn list(&self) -> StoreResult<Vec<String>>;

    /// Removes the whole namespace
    fn destroy(&self) -> StoreResult<()>;
}
