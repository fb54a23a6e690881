use std::collections::BTreeSet;
use std::fmt;

use tpub_sink::{PublishError, PublishIntent};

/// Raw identifiers published by the last successful cycle.
pub type TrackedSet = BTreeSet<String>;

// ---------------------------------------------------------------------------
// Source rows
// ---------------------------------------------------------------------------

/// One fetched row. Validity is judged by the planner, not the fetcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRow {
    pub id: Option<String>,
    pub value: Option<String>,
}

impl SourceRow {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            value: Some(value.into()),
        }
    }

    pub fn with_null_value(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            value: None,
        }
    }

    pub fn with_null_id(value: impl Into<String>) -> Self {
        Self {
            id: None,
            value: Some(value.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FetchError
// ---------------------------------------------------------------------------

/// Why a snapshot fetch failed. Drives log level and wording, never retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The source table does not exist.
    SchemaMissing,
    /// The table exists but a required column does not (or cannot be read).
    SchemaMismatch,
    /// The source could not be reached or the session broke.
    Connectivity,
    Other,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::SchemaMissing => "schema_missing",
            FetchErrorKind::SchemaMismatch => "schema_mismatch",
            FetchErrorKind::Connectivity => "connectivity",
            FetchErrorKind::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    /// Table the fetch targeted.
    pub table: String,
    /// Driver-level detail.
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            message: message.into(),
        }
    }

    /// Worth retrying on the next poll without operator action.
    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Connectivity
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FetchErrorKind::SchemaMissing => {
                write!(f, "table '{}' is missing: {}", self.table, self.message)
            }
            FetchErrorKind::SchemaMismatch => write!(
                f,
                "required column(s) missing in table '{}': {}",
                self.table, self.message
            ),
            FetchErrorKind::Connectivity => {
                write!(f, "cannot reach data source: {}", self.message)
            }
            FetchErrorKind::Other => {
                write!(f, "fetch from '{}' failed: {}", self.table, self.message)
            }
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Why a row contributed nothing to the cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    /// Identifier is empty after trimming.
    BlankId,
    MissingValue,
    /// Identifier normalises to a topic containing `+`, `#` or NUL.
    InvalidTopic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    /// Position in the fetched snapshot.
    pub index: usize,
    pub id: Option<String>,
    pub reason: SkipReason,
}

/// Two distinct raw identifiers that address the same topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicCollision {
    pub topic: String,
    pub first_id: String,
    pub other_id: String,
}

/// Everything one cycle intends to send, plus the bookkeeping behind it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// One retained publish per live topic, in first-seen row order.
    pub publishes: Vec<PublishIntent>,
    /// One clear per vanished topic, in identifier order.
    pub clears: Vec<PublishIntent>,
    /// Valid identifiers in this snapshot. Becomes the tracked set on success.
    pub current: TrackedSet,
    /// `tracked − current`.
    pub to_clear: TrackedSet,
    pub skipped: Vec<SkippedRow>,
    pub collisions: Vec<TopicCollision>,
    /// Identifiers in `to_clear` whose topic is republished this cycle, so no
    /// clear was emitted for them.
    pub suppressed_clears: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.publishes.is_empty() && self.clears.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleFailure {
    Fetch(FetchError),
    /// A publish or clear was refused. Counts cover intents accepted before it.
    Publish {
        error: PublishError,
        published: usize,
        cleared: usize,
    },
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleFailure::Fetch(e) => write!(f, "fetch failed: {e}"),
            CycleFailure::Publish {
                error,
                published,
                cleared,
            } => write!(
                f,
                "{error} (after {published} publish(es), {cleared} clear(s))"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Success { published: usize, cleared: usize },
    Failure(CycleFailure),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success { .. })
    }

    pub fn failure(&self) -> Option<&CycleFailure> {
        match self {
            CycleOutcome::Failure(f) => Some(f),
            CycleOutcome::Success { .. } => None,
        }
    }
}
