//! core::lock
//!
//! Exclusive cross-process lock held while fixes are applied.
//!
//! # Storage
//!
//! - `<git_dir>/trisync/lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock is held for the entire auto-fix run
//! - Lock is released on drop
//! - Acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```ignore
//! use trisync::core::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(&git_dir)?;
//! // apply operations
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Directory under the git dir that holds trisync state.
pub const STATE_DIR: &str = "trisync";

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another trisync process ({path})")]
    AlreadyLocked { path: PathBuf },

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the repository.
///
/// Released automatically when dropped.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Path of the lock file for a given git directory.
    pub fn lock_path(git_dir: &Path) -> PathBuf {
        git_dir.join(STATE_DIR).join("lock")
    }

    /// Attempt to acquire the repository lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// Returns [`LockError::AlreadyLocked`] immediately if another process
    /// holds it.
    pub fn acquire(git_dir: &Path) -> Result<Self, LockError> {
        let dir = git_dir.join(STATE_DIR);
        fs::create_dir_all(&dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = Self::lock_path(git_dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired repository lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked { path })
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
            tracing::debug!(path = %self.path.display(), "released repository lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_state_dir() {
        let temp = TempDir::new().unwrap();
        let lock = RepoLock::acquire(temp.path()).unwrap();
        assert!(lock.is_held());
        assert!(temp.path().join("trisync").is_dir());
        assert_eq!(lock.path(), RepoLock::lock_path(temp.path()));
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let temp = TempDir::new().unwrap();
        let _first = RepoLock::acquire(temp.path()).unwrap();
        let second = RepoLock::acquire(temp.path());
        assert!(matches!(second, Err(LockError::AlreadyLocked { .. })));
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _lock = RepoLock::acquire(temp.path()).unwrap();
        }
        assert!(RepoLock::acquire(temp.path()).is_ok());
    }
}
