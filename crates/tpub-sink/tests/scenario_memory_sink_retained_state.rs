//! Scenario: in-memory broker retained-state semantics
//!
//! # Invariants under test
//!
//! 1. A retained publish replaces the topic's retained payload.
//! 2. A clear removes the retained payload; clearing an absent topic succeeds.
//! 3. `disconnect` refuses every publish with `NotConnected` and records nothing.
//! 4. `fail_on_topic` refuses only that topic.
//! 5. `fail_after(n)` accepts exactly `n` publishes.
//!
//! All tests are pure in-process.

use tpub_sink::{MemorySink, PublishError, PublishIntent, PublishSink};

#[tokio::test]
async fn retained_publish_replaces_previous_payload() {
    let sink = MemorySink::new();
    sink.publish(&PublishIntent::retained("rovers/R1", "1")).await.unwrap();
    sink.publish(&PublishIntent::retained("rovers/R1", "2")).await.unwrap();

    assert_eq!(sink.retained("rovers/R1"), Some(b"2".to_vec()));
    assert_eq!(sink.sent().len(), 2);
}

#[tokio::test]
async fn clear_removes_retained_and_is_noop_when_absent() {
    let sink = MemorySink::with_retained([("rovers/old", "x")]);

    sink.publish(&PublishIntent::clear("rovers/old")).await.unwrap();
    assert_eq!(sink.retained("rovers/old"), None);

    // Clearing a topic that never held anything is still a success.
    sink.publish(&PublishIntent::clear("rovers/never")).await.unwrap();
    assert!(sink.retained_snapshot().is_empty());
}

#[tokio::test]
async fn disconnected_sink_refuses_everything() {
    let sink = MemorySink::new();
    sink.disconnect();

    let err = sink
        .publish(&PublishIntent::retained("rovers/R1", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::NotConnected { .. }));
    assert!(sink.sent().is_empty());
    assert_eq!(sink.attempts(), 1);

    sink.reconnect();
    sink.publish(&PublishIntent::retained("rovers/R1", "1")).await.unwrap();
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn poisoned_topic_fails_alone() {
    let sink = MemorySink::new();
    sink.fail_on_topic("rovers/bad");

    sink.publish(&PublishIntent::retained("rovers/good", "1")).await.unwrap();
    let err = sink
        .publish(&PublishIntent::retained("rovers/bad", "1"))
        .await
        .unwrap_err();
    assert_eq!(err.topic(), "rovers/bad");
    assert!(matches!(err, PublishError::Client { .. }));
}

#[tokio::test]
async fn accept_budget_is_exact() {
    let sink = MemorySink::new();
    sink.fail_after(2);

    let a = PublishIntent::retained("t/a", "1");
    let b = PublishIntent::retained("t/b", "1");
    let c = PublishIntent::retained("t/c", "1");
    assert!(sink.publish(&a).await.is_ok());
    assert!(sink.publish(&b).await.is_ok());
    assert!(sink.publish(&c).await.is_err());
    assert_eq!(sink.sent(), vec![a, b]);

    sink.heal();
    assert!(sink.publish(&c).await.is_ok());
}
