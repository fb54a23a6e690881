//! tpub-state
//!
//! Durable record of the identifiers published by the last successful cycle.
//!
//! Two stores implement [`TrackingStore`]:
//! - [`JsonFileStore`]: a single JSON array file, replaced atomically on commit.
//! - [`MemoryStore`]: in-process, for tests and dry runs.
//!
//! `load` never fails: missing state is an empty set, unreadable or corrupt
//! state is logged and also an empty set. Only `commit` reports errors.

mod file;
mod memory;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Raw entity identifiers, kept sorted so the persisted file is deterministic.
pub type TrackedSet = BTreeSet<String>;

/// Storage contract for the tracked set.
pub trait TrackingStore: Send + Sync {
    /// Last committed set, or empty when there is none or it cannot be read.
    fn load(&self) -> TrackedSet;

    /// Replace the stored set with `set`. A reader never observes a partial write.
    fn commit(&self, set: &TrackedSet) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// Stored content exists but cannot be read or decoded.
    Corrupt { path: PathBuf, reason: String },
    /// The new set could not be written.
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Corrupt { path, reason } => {
                write!(f, "tracking state {} is corrupt: {reason}", path.display())
            }
            StoreError::WriteFailure { path, source } => {
                write!(f, "tracking state {} write failed: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Corrupt { .. } => None,
            StoreError::WriteFailure { source, .. } => Some(source),
        }
    }
}
