//! Directory-backed storage: one file per key

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::backend::StorageBackend;
use super::errors::{StoreError, StoreResult};

/// Local filesystem backend rooted at one directory.
///
/// Writes go to a hidden temp file that is renamed into place, so a
/// reader sees either the old file or the complete new one. Names that
/// start with `.` are private to the backend and never listed.
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    sync: bool,
    create_root: bool,
}

impl LocalBackend {
    /// Create a backend over `root`. The directory is created on first write.
    pub fn new(root: PathBuf, sync: bool) -> Self {
        Self {
            root,
            sync,
            create_root: true,
        }
    }

    /// Create a backend over a directory that must already exist. Writes
    /// fail once it has been removed.
    pub fn existing(root: PathBuf, sync: bool) -> Self {
        Self {
            root,
            sync,
            create_root: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains('/')
            || key.contains('\\')
            || key.contains('\0')
        {
            return Err(StoreError::IllegalName {
                what: "storage key",
                name: key.to_string(),
            });
        }
        Ok(self.root.join(key))
    }
}

/// Writes `data` to `path` through a hidden temp file and a rename.
///
/// With `create_dir` unset, a missing parent directory is an error.
pub(crate) fn write_atomic(
    path: &Path,
    data: &[u8],
    sync: bool,
    create_dir: bool,
) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Internal(format!("{} has no parent", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::Internal(format!("{} has no file name", path.display())))?;
    let temp_path = dir.join(format!(".{}.tmp", file_name.trim_start_matches('.')));

    if create_dir {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir.display(), e))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| StoreError::io(temp_path.display(), e))?;
    file.write_all(data)
        .map_err(|e| StoreError::io(temp_path.display(), e))?;
    if sync {
        file.sync_all()
            .map_err(|e| StoreError::io(temp_path.display(), e))?;
    }
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::io(path.display(), e)
    })?;

    if sync {
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

impl StorageBackend for LocalBackend {
    fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let full_path = self.full_path(key)?;
        write_atomic(&full_path, data, self.sync, self.create_root)
    }

    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let full_path = self.full_path(key)?;
        match fs::read(&full_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(full_path.display(), e)),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let full_path = self.full_path(key)?;
        match fs::remove_file(&full_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(full_path.display(), e)),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.full_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(self.root.display(), e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(self.root.display(), e))?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    fn destroy(&self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(self.root.display(), e)),
        }
    }
}
