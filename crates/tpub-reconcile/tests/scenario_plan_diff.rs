//! Scenario: pure plan diff
//!
//! # Invariants under test
//!
//! 1. Publishes follow row order; each is retained QoS 1 with the row's value.
//! 2. `to_clear = tracked − current`; each member yields exactly one clear.
//! 3. No current identifier yields a clear.
//! 4. Invalid rows (no id, blank id, no value, wildcard id) contribute nothing.
//! 5. Duplicate ids: first position, last value, counted once.
//! 6. `current` equals the valid identifiers regardless of the tracked set.
//! 7. Colliding identifiers merge into one publish and never clear a live topic.
//!
//! All tests are pure in-process; no sink involved.

use std::collections::BTreeSet;

use tpub_reconcile::{plan, SkipReason, SourceRow, TopicScheme, TrackedSet};
use tpub_sink::{PublishIntent, QoS};

fn tracked(ids: &[&str]) -> TrackedSet {
    ids.iter().map(|s| s.to_string()).collect()
}

fn topics(intents: &[PublishIntent]) -> Vec<&str> {
    intents.iter().map(|i| i.topic.as_str()).collect()
}

// ---------------------------------------------------------------------------
// 1-3. Basic diff
// ---------------------------------------------------------------------------

#[test]
fn publish_new_and_clear_vanished() {
    let rows = vec![SourceRow::new("A", "1"), SourceRow::new("C", "3")];
    let p = plan(&rows, &tracked(&["A", "B"]), &TopicScheme::default());

    assert_eq!(
        p.publishes,
        vec![
            PublishIntent::retained("rovers/A", "1"),
            PublishIntent::retained("rovers/C", "3"),
        ]
    );
    assert_eq!(p.clears, vec![PublishIntent::clear("rovers/B")]);
    assert_eq!(p.to_clear, tracked(&["B"]));
    assert_eq!(p.current, tracked(&["A", "C"]));

    for i in p.publishes.iter().chain(p.clears.iter()) {
        assert!(i.retain);
        assert_eq!(i.qos, QoS::AtLeastOnce);
    }
}

#[test]
fn spaces_and_slashes_normalise_into_topic() {
    let rows = vec![SourceRow::new("x y/z", "v")];
    let p = plan(&rows, &TrackedSet::new(), &TopicScheme::default());

    assert_eq!(p.publishes, vec![PublishIntent::retained("rovers/x_y_z", "v")]);
    // Raw identifier is what gets tracked.
    assert_eq!(p.current, tracked(&["x y/z"]));
}

#[test]
fn empty_snapshot_and_empty_tracked_is_noop() {
    let p = plan(&[], &TrackedSet::new(), &TopicScheme::default());
    assert!(p.is_noop());
    assert!(p.current.is_empty());
    assert!(p.to_clear.is_empty());
}

#[test]
fn empty_snapshot_clears_everything_tracked() {
    let p = plan(&[], &tracked(&["A", "B", "C"]), &TopicScheme::default());

    assert!(p.publishes.is_empty());
    assert_eq!(
        topics(&p.clears),
        vec!["rovers/A", "rovers/B", "rovers/C"]
    );
    assert!(p.current.is_empty());
}

#[test]
fn every_vanished_id_clears_exactly_once_and_no_live_id_clears() {
    let prior = tracked(&["k1", "k2", "k3", "k4", "k5"]);
    let rows = vec![
        SourceRow::new("k2", "a"),
        SourceRow::new("k9", "b"),
        SourceRow::new("k4", "c"),
    ];
    let p = plan(&rows, &prior, &TopicScheme::default());

    let expected: BTreeSet<String> = prior.difference(&p.current).cloned().collect();
    assert_eq!(p.to_clear, expected);
    assert_eq!(p.clears.len(), expected.len());

    let cleared: BTreeSet<&str> = p.clears.iter().map(|c| c.topic.as_str()).collect();
    assert_eq!(cleared.len(), p.clears.len(), "no duplicate clears");
    for id in &p.current {
        let topic = format!("rovers/{id}");
        assert!(!cleared.contains(topic.as_str()), "{id} is live and must not be cleared");
    }
}

// ---------------------------------------------------------------------------
// 4. Invalid rows
// ---------------------------------------------------------------------------

#[test]
fn invalid_rows_contribute_nothing() {
    let rows = vec![
        SourceRow::with_null_id("orphan"),
        SourceRow::new("", "empty id"),
        SourceRow::new("   ", "blank id"),
        SourceRow::with_null_value("R1"),
        SourceRow::new("bad+topic", "wild"),
        SourceRow::new("R2", "ok"),
    ];
    let p = plan(&rows, &TrackedSet::new(), &TopicScheme::default());

    assert_eq!(p.publishes, vec![PublishIntent::retained("rovers/R2", "ok")]);
    assert_eq!(p.current, tracked(&["R2"]));

    let reasons: Vec<(usize, SkipReason)> = p.skipped.iter().map(|s| (s.index, s.reason)).collect();
    assert_eq!(
        reasons,
        vec![
            (0, SkipReason::MissingId),
            (1, SkipReason::BlankId),
            (2, SkipReason::BlankId),
            (3, SkipReason::MissingValue),
            (4, SkipReason::InvalidTopic),
        ]
    );
}

#[test]
fn tracked_id_whose_row_turned_invalid_is_cleared() {
    // R1 was published last cycle; this cycle its value is NULL.
    let rows = vec![SourceRow::with_null_value("R1")];
    let p = plan(&rows, &tracked(&["R1"]), &TopicScheme::default());

    assert!(p.publishes.is_empty());
    assert_eq!(p.clears, vec![PublishIntent::clear("rovers/R1")]);
    assert!(p.current.is_empty());
}

#[test]
fn empty_string_value_is_still_published() {
    let rows = vec![SourceRow::new("R1", "")];
    let p = plan(&rows, &TrackedSet::new(), &TopicScheme::default());
    assert_eq!(p.publishes.len(), 1);
    assert_eq!(p.current, tracked(&["R1"]));
}

// ---------------------------------------------------------------------------
// 5. Duplicates
// ---------------------------------------------------------------------------

#[test]
fn duplicate_id_keeps_first_position_and_last_value() {
    let rows = vec![
        SourceRow::new("A", "old"),
        SourceRow::new("B", "b"),
        SourceRow::new("A", "new"),
    ];
    let p = plan(&rows, &TrackedSet::new(), &TopicScheme::default());

    assert_eq!(
        p.publishes,
        vec![
            PublishIntent::retained("rovers/A", "new"),
            PublishIntent::retained("rovers/B", "b"),
        ]
    );
    assert_eq!(p.current, tracked(&["A", "B"]));
    assert!(p.collisions.is_empty(), "same raw id is not a collision");
}

// ---------------------------------------------------------------------------
// 6. Current is independent of tracked
// ---------------------------------------------------------------------------

#[test]
fn current_ignores_prior_tracked_contents() {
    let rows = vec![SourceRow::new("A", "1"), SourceRow::new("B", "2")];
    let scheme = TopicScheme::default();

    let from_empty = plan(&rows, &TrackedSet::new(), &scheme);
    let from_overlap = plan(&rows, &tracked(&["A", "Z"]), &scheme);
    let from_disjoint = plan(&rows, &tracked(&["X", "Y"]), &scheme);

    assert_eq!(from_empty.current, tracked(&["A", "B"]));
    assert_eq!(from_overlap.current, from_empty.current);
    assert_eq!(from_disjoint.current, from_empty.current);
    assert_eq!(from_empty.publishes, from_disjoint.publishes);
}

#[test]
fn custom_prefix_applies_to_publishes_and_clears() {
    let rows = vec![SourceRow::new("A", "1")];
    let p = plan(&rows, &tracked(&["B"]), &TopicScheme::new("fleet/units/"));

    assert_eq!(topics(&p.publishes), vec!["fleet/units/A"]);
    assert_eq!(topics(&p.clears), vec!["fleet/units/B"]);
}

// ---------------------------------------------------------------------------
// 7. Normalisation collisions
// ---------------------------------------------------------------------------

#[test]
fn colliding_ids_merge_last_value_wins() {
    let rows = vec![SourceRow::new("A B", "first"), SourceRow::new("A_B", "second")];
    let p = plan(&rows, &TrackedSet::new(), &TopicScheme::default());

    assert_eq!(p.publishes, vec![PublishIntent::retained("rovers/A_B", "second")]);
    assert_eq!(p.current, tracked(&["A B", "A_B"]));
    assert_eq!(p.collisions.len(), 1);
    assert_eq!(p.collisions[0].first_id, "A B");
    assert_eq!(p.collisions[0].other_id, "A_B");
}

#[test]
fn vanished_id_sharing_a_live_topic_is_not_cleared() {
    // "A B" disappeared, but "A_B" still publishes to rovers/A_B.
    let rows = vec![SourceRow::new("A_B", "live")];
    let p = plan(&rows, &tracked(&["A B", "A_B"]), &TopicScheme::default());

    assert!(p.clears.is_empty());
    assert_eq!(p.suppressed_clears, vec!["A B".to_string()]);
    assert_eq!(p.to_clear, tracked(&["A B"]));
    assert_eq!(p.current, tracked(&["A_B"]));
}

#[test]
fn vanished_ids_sharing_a_topic_clear_it_once() {
    let p = plan(&[], &tracked(&["A B", "A/B"]), &TopicScheme::default());
    assert_eq!(p.clears, vec![PublishIntent::clear("rovers/A_B")]);
}

#[test]
fn tracked_id_without_a_topic_leaves_without_a_clear() {
    // Only reachable from a hand-edited tracking file.
    let p = plan(&[], &tracked(&["bad+topic", "B"]), &TopicScheme::default());

    assert_eq!(p.clears, vec![PublishIntent::clear("rovers/B")]);
    assert_eq!(p.to_clear, tracked(&["B", "bad+topic"]));
    assert!(p.current.is_empty());
}
