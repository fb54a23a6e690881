//! Scenario: in-memory tracking store
//!
//! # Invariants under test
//!
//! 1. `with_set` seeds the loaded set.
//! 2. An injected failure rejects exactly one commit and keeps the old set.

use tpub_state::{MemoryStore, StoreError, TrackedSet, TrackingStore};

#[test]
fn seeded_store_loads_seed() {
    let store = MemoryStore::with_set(["A", "B"]);
    let expected: TrackedSet = ["A", "B"].iter().map(|s| s.to_string()).collect();
    assert_eq!(store.load(), expected);
}

#[test]
fn injected_failure_is_one_shot_and_preserves_state() {
    let store = MemoryStore::with_set(["A"]);
    let next: TrackedSet = ["B".to_string()].into_iter().collect();

    store.fail_next_commit();
    let err = store.commit(&next).unwrap_err();
    assert!(matches!(err, StoreError::WriteFailure { .. }));
    assert_eq!(store.load(), ["A".to_string()].into_iter().collect());
    assert_eq!(store.commit_count(), 0);

    store.commit(&next).unwrap();
    assert_eq!(store.load(), next);
    assert_eq!(store.commit_count(), 1);
}
