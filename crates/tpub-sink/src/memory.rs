//! Deterministic in-memory broker.
//!
//! - Every accepted intent is appended to `sent()` in call order.
//! - Retained state follows broker rules: a retained publish replaces the
//!   topic's message, an empty retained publish removes it (no-op if absent).
//! - Failures are scripted, never random: a whole-sink disconnect, a single
//!   poisoned topic, or "accept N more, then fail".

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{PublishError, PublishIntent, PublishSink};

#[derive(Debug, Default)]
struct Inner {
    sent: Vec<PublishIntent>,
    retained: BTreeMap<String, Vec<u8>>,
    attempts: usize,
    disconnected: bool,
    fail_topic: Option<String>,
    accept_budget: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate retained state, as if left over from an earlier run.
    pub fn with_retained<I, T, P>(items: I) -> Self
    where
        I: IntoIterator<Item = (T, P)>,
        T: Into<String>,
        P: Into<Vec<u8>>,
    {
        let sink = Self::default();
        {
            let mut inner = sink.lock();
            for (topic, payload) in items {
                inner.retained.insert(topic.into(), payload.into());
            }
        }
        sink
    }

    /// Refuse every publish with `NotConnected` until [`MemorySink::reconnect`].
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.lock().disconnected = false;
    }

    /// Refuse publishes to `topic` with a client error.
    pub fn fail_on_topic(&self, topic: impl Into<String>) {
        self.lock().fail_topic = Some(topic.into());
    }

    /// Accept `n` more publishes, then refuse the rest with `NotConnected`.
    pub fn fail_after(&self, n: usize) {
        self.lock().accept_budget = Some(n);
    }

    /// Remove all scripted failures.
    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.disconnected = false;
        inner.fail_topic = None;
        inner.accept_budget = None;
    }

    pub fn sent(&self) -> Vec<PublishIntent> {
        self.lock().sent.clone()
    }

    /// Publish calls made, accepted or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn clear_log(&self) {
        let mut inner = self.lock();
        inner.sent.clear();
        inner.attempts = 0;
    }

    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.lock().retained.get(topic).cloned()
    }

    /// Retained topics and payloads (as text), sorted by topic.
    pub fn retained_snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .retained
            .iter()
            .map(|(t, p)| (t.clone(), String::from_utf8_lossy(p).into_owned()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl PublishSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError> {
        let mut inner = self.lock();
        inner.attempts += 1;

        if inner.disconnected {
            return Err(PublishError::NotConnected {
                topic: intent.topic.clone(),
            });
        }
        if inner.fail_topic.as_deref() == Some(intent.topic.as_str()) {
            return Err(PublishError::Client {
                topic: intent.topic.clone(),
                message: "scripted failure".to_string(),
            });
        }
        if let Some(budget) = inner.accept_budget.as_mut() {
            if *budget == 0 {
                return Err(PublishError::NotConnected {
                    topic: intent.topic.clone(),
                });
            }
            *budget -= 1;
        }

        if intent.retain {
            if intent.payload.is_empty() {
                inner.retained.remove(&intent.topic);
            } else {
                inner
                    .retained
                    .insert(intent.topic.clone(), intent.payload.clone());
            }
        }
        inner.sent.push(intent.clone());
        Ok(())
    }
}
