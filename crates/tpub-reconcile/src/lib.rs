//! tpub-reconcile
//!
//! Reconciliation between source rows and broker-retained state.
//!
//! Each cycle:
//! - [`plan`] diffs the fetched rows against the tracked set. Pure, no IO.
//! - [`execute`] sends the plan's publishes, then its clears, through a
//!   [`tpub_sink::PublishSink`], stopping at the first refusal.
//! - [`reconcile`] ties both together and decides the next tracked set:
//!   the new identifiers on full success, the old set unchanged otherwise.
//!
//! Source adapters implement [`SnapshotSource`] and report failures as a
//! classified [`FetchError`].

mod engine;
mod source;
mod topic;
mod types;

pub use engine::{execute, plan, reconcile, Execution};
pub use source::{ScriptedSource, SnapshotSource};
pub use topic::{TopicScheme, DEFAULT_PREFIX};
pub use types::*;
