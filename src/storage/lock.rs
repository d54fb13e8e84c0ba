//! Single-owner lock on a storage root.
//!
//! Each shard keeps its index in memory, so two stores writing the same root
//! would diverge, and one compaction would drop the other's records. The lock
//! is an advisory `flock` on `<root>/LOCK`, released when the handle drops.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug)]
pub struct RootLock {
    path: PathBuf,
    _file: File,
}

impl RootLock {
    /// Take the lock without blocking. A root already owned by another open
    /// store, in this process or another, is a configuration error.
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                Error::Config(format!("cannot open lock file {}: {}", path.display(), e))
            })?;

        file.try_lock_exclusive().map_err(|e| {
            Error::Config(format!(
                "storage root {} is already in use by another store: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempdir().unwrap();
        let lock = RootLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = RootLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(RootLock::acquire(dir.path()).unwrap());
        assert!(RootLock::acquire(dir.path()).is_ok());
    }
}
