use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::{FetchError, SourceRow};

/// Data source contract: one full snapshot per call, no internal retry.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short description for logs, e.g. `"mysql SITH.rovers"`.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<SourceRow>, FetchError>;
}

/// Replays queued fetch results in order; once drained, repeats the last one.
///
/// An unused source (nothing ever queued) returns an empty snapshot.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    inner: Mutex<Script>,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Result<Vec<SourceRow>, FetchError>>,
    last: Option<Result<Vec<SourceRow>, FetchError>>,
    calls: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<SourceRow>) -> &Self {
        self.lock().queue.push_back(Ok(rows));
        self
    }

    pub fn push_error(&self, err: FetchError) -> &Self {
        self.lock().queue.push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self) -> Result<Vec<SourceRow>, FetchError> {
        let mut script = self.lock();
        script.calls += 1;
        if let Some(next) = script.queue.pop_front() {
            script.last = Some(next.clone());
            return next;
        }
        script.last.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}
