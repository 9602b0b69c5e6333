//! The "ongoing focus time" marker.
//!
//! Its presence is the only persisted state of the sync state machine: it
//! records that start commands ran without a matching stop. It reflects the
//! last committed transition, not calendar truth.

use crate::errors::AppResult;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

impl SessionState {
    pub fn from_marker(present: bool) -> Self {
        if present {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(self) -> bool {
        self == SessionState::Active
    }
}

/// Durable boolean read at sync entry and written at sync exit.
pub trait MarkerStore {
    fn ongoing_focustime_markerfile_exists(&self) -> AppResult<bool>;

    /// Create (`true`) or delete (`false`) the marker. Both are idempotent.
    fn set_ongoing_focustime(&mut self, ongoing: bool) -> AppResult<()>;

    fn state(&self) -> AppResult<SessionState> {
        Ok(SessionState::from_marker(
            self.ongoing_focustime_markerfile_exists()?,
        ))
    }
}

/// Marker backed by an empty file in the storage directory.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarkerStore for FileMarker {
    fn ongoing_focustime_markerfile_exists(&self) -> AppResult<bool> {
        Ok(self.path.is_file())
    }

    fn set_ongoing_focustime(&mut self, ongoing: bool) -> AppResult<()> {
        if ongoing {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&self.path)?;
            return Ok(());
        }

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Marker kept in memory, for driving the sync engine without a filesystem.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarker {
    ongoing: bool,
    writes: usize,
}

impl InMemoryMarker {
    pub fn new(ongoing: bool) -> Self {
        Self { ongoing, writes: 0 }
    }

    /// How often the marker has been written.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl MarkerStore for InMemoryMarker {
    fn ongoing_focustime_markerfile_exists(&self) -> AppResult<bool> {
        Ok(self.ongoing)
    }

    fn set_ongoing_focustime(&mut self, ongoing: bool) -> AppResult<()> {
        self.ongoing = ongoing;
        self.writes += 1;
        Ok(())
    }
}
