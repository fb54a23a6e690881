use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{StoreError, TrackedSet, TrackingStore};

/// In-process tracking store.
///
/// `fail_next_commit` makes exactly one subsequent commit fail with
/// `WriteFailure`, leaving the stored set untouched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    set: Mutex<TrackedSet>,
    fail_next: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        *store.lock() = items.into_iter().map(Into::into).collect();
        store
    }

    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> TrackedSet {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackedSet> {
        self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TrackingStore for MemoryStore {
    fn load(&self) -> TrackedSet {
        self.snapshot()
    }

    fn commit(&self, set: &TrackedSet) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteFailure {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected commit failure"),
            });
        }
        *self.lock() = set.clone();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
