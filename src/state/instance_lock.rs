//! Single-instance guard.
//!
//! An exclusive advisory lock on a file in the storage directory, held for the
//! whole invocation. A second invocation fails immediately instead of waiting.
//! The OS drops the lock when the process exits, even on a crash.

use crate::errors::{AppError, AppResult};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

#[derive(Debug)]
pub struct InstanceLock {
    // keeps the descriptor, and with it the lock, alive
    _file: File,
}

impl InstanceLock {
    /// Take the lock or fail with `AlreadyRunning`.
    pub fn acquire(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        if !try_lock_exclusive(&file)? {
            return Err(AppError::AlreadyRunning);
        }
        Ok(Self { _file: file })
    }
}

fn try_lock_exclusive(file: &File) -> AppResult<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(fs::TryLockError::WouldBlock) => Ok(false),
        Err(fs::TryLockError::Error(e)) => Err(e.into()),
    }
}
