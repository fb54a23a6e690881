use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{StoreError, TrackedSet, TrackingStore};

/// Tracked set persisted as a JSON array of strings.
///
/// Commit writes a sibling temp file, fsyncs it and renames it over the
/// target, so the file at `path` is always either the old or the new set.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load: `Ok(None)` when no file exists, `Err(Corrupt)` when it
    /// cannot be read or decoded.
    pub fn try_load(&self) -> Result<Option<TrackedSet>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(format!("unreadable: {e}"))),
        };

        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| self.corrupt(format!("invalid JSON: {e}")))?;
        let Value::Array(items) = value else {
            return Err(self.corrupt("expected a JSON array".to_string()));
        };

        let mut set = TrackedSet::new();
        for item in items {
            match item {
                Value::String(s) => {
                    set.insert(s);
                }
                // Older files may hold numeric identifiers; they were published
                // under their decimal form, so that is how they are tracked.
                Value::Number(n) => {
                    set.insert(n.to_string());
                }
                other => {
                    return Err(self.corrupt(format!("unexpected array element {other}")));
                }
            }
        }
        Ok(Some(set))
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }

    fn write_failure(&self, source: io::Error) -> StoreError {
        StoreError::WriteFailure {
            path: self.path.clone(),
            source,
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl TrackingStore for JsonFileStore {
    fn load(&self) -> TrackedSet {
        match self.try_load() {
            Ok(Some(set)) => {
                debug!(path = %self.path.display(), tracked = set.len(), "loaded tracking state");
                set
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no tracking state yet; starting empty");
                TrackedSet::new()
            }
            Err(e) => {
                warn!(error = %e, "could not load tracking state; starting fresh");
                TrackedSet::new()
            }
        }
    }

    fn commit(&self, set: &TrackedSet) -> Result<(), StoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| self.write_failure(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_failure(e))?;
        serde_json::to_writer(&mut tmp, set)
            .map_err(|e| self.write_failure(io::Error::new(io::ErrorKind::Other, e)))?;
        tmp.write_all(b"\n").map_err(|e| self.write_failure(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_failure(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_failure(e.error))?;

        debug!(path = %self.path.display(), tracked = set.len(), "committed tracking state");
        Ok(())
    }
}
