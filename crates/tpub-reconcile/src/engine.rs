use std::collections::{HashMap, HashSet};

use tpub_sink::{PublishError, PublishIntent, PublishSink};
use tracing::{debug, info, warn};

use crate::{
    CycleFailure, CycleOutcome, FetchError, ReconcilePlan, SkipReason, SkippedRow, SourceRow,
    TopicCollision, TopicScheme, TrackedSet,
};

fn skip(plan: &mut ReconcilePlan, index: usize, id: Option<&String>, reason: SkipReason) {
    plan.skipped.push(SkippedRow {
        index,
        id: id.cloned(),
        reason,
    });
}

/// Deterministic diff:
/// - Rows without an id, with a blank id, without a value, or whose id cannot
///   name a topic are skipped.
/// - Each remaining row yields a retained publish; repeated topics keep the
///   first row's position and the last row's value.
/// - Every tracked id absent from the snapshot yields one clear, unless its
///   topic is being republished in this same cycle.
pub fn plan(rows: &[SourceRow], tracked: &TrackedSet, scheme: &TopicScheme) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    // topic -> (index into plan.publishes, first raw id seen for it)
    let mut by_topic: HashMap<String, (usize, String)> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(id) = row.id.as_ref() else {
            skip(&mut plan, index, None, SkipReason::MissingId);
            continue;
        };
        if id.trim().is_empty() {
            skip(&mut plan, index, Some(id), SkipReason::BlankId);
            continue;
        }
        let Some(value) = row.value.as_ref() else {
            skip(&mut plan, index, Some(id), SkipReason::MissingValue);
            continue;
        };
        let Some(topic) = scheme.topic_for(id) else {
            skip(&mut plan, index, Some(id), SkipReason::InvalidTopic);
            continue;
        };

        match by_topic.get(&topic) {
            Some((slot, first_id)) => {
                if first_id != id {
                    plan.collisions.push(TopicCollision {
                        topic: topic.clone(),
                        first_id: first_id.clone(),
                        other_id: id.clone(),
                    });
                }
                plan.publishes[*slot].payload = value.clone().into_bytes();
            }
            None => {
                by_topic.insert(topic.clone(), (plan.publishes.len(), id.clone()));
                plan.publishes.push(PublishIntent::retained(topic, value.clone()));
            }
        }
        plan.current.insert(id.clone());
    }

    let to_clear: TrackedSet = tracked.difference(&plan.current).cloned().collect();

    let mut cleared_topics: HashSet<String> = HashSet::new();
    for id in &to_clear {
        // Only a hand-edited or legacy tracking file can hold such an id;
        // there is no topic to clear for it.
        let Some(topic) = scheme.topic_for(id) else {
            warn!(id = %id, "dropping tracked identifier that cannot name a topic");
            continue;
        };
        if by_topic.contains_key(&topic) {
            plan.suppressed_clears.push(id.clone());
            continue;
        }
        if cleared_topics.insert(topic.clone()) {
            plan.clears.push(PublishIntent::clear(topic));
        }
    }
    plan.to_clear = to_clear;

    plan
}

/// Result of sending a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub published: usize,
    pub cleared: usize,
    /// First refusal; nothing after it was attempted.
    pub error: Option<PublishError>,
}

/// Send all publishes, then all clears. Stops at the first refused intent.
pub async fn execute<S>(plan: &ReconcilePlan, sink: &S) -> Execution
where
    S: PublishSink + ?Sized,
{
    let mut exec = Execution {
        published: 0,
        cleared: 0,
        error: None,
    };

    for intent in &plan.publishes {
        if let Err(e) = sink.publish(intent).await {
            exec.error = Some(e);
            return exec;
        }
        exec.published += 1;
        debug!(topic = %intent.topic, payload = %intent.payload_str(), "published");
    }

    for intent in &plan.clears {
        if let Err(e) = sink.publish(intent).await {
            exec.error = Some(e);
            return exec;
        }
        exec.cleared += 1;
        debug!(topic = %intent.topic, "cleared retained topic");
    }

    exec
}

/// One full reconciliation step.
///
/// Returns the outcome and the tracked set to carry into the next cycle:
/// `plan.current` on success, an unchanged copy of `tracked` on any failure.
pub async fn reconcile<S>(
    snapshot: Result<Vec<SourceRow>, FetchError>,
    tracked: &TrackedSet,
    scheme: &TopicScheme,
    sink: &S,
) -> (CycleOutcome, TrackedSet)
where
    S: PublishSink + ?Sized,
{
    let rows = match snapshot {
        Ok(rows) => rows,
        Err(e) => {
            return (
                CycleOutcome::Failure(CycleFailure::Fetch(e)),
                tracked.clone(),
            )
        }
    };

    if rows.is_empty() {
        info!("no records found in source table");
    }

    let plan = plan(&rows, tracked, scheme);
    log_plan_notes(&plan);

    let exec = execute(&plan, sink).await;
    match exec.error {
        Some(error) => (
            CycleOutcome::Failure(CycleFailure::Publish {
                error,
                published: exec.published,
                cleared: exec.cleared,
            }),
            tracked.clone(),
        ),
        None => (
            CycleOutcome::Success {
                published: exec.published,
                cleared: exec.cleared,
            },
            plan.current,
        ),
    }
}

fn log_plan_notes(plan: &ReconcilePlan) {
    for s in &plan.skipped {
        debug!(index = s.index, id = ?s.id, reason = ?s.reason, "skipping invalid record");
    }
    for c in &plan.collisions {
        warn!(
            topic = %c.topic,
            first_id = %c.first_id,
            other_id = %c.other_id,
            "identifiers normalise to the same topic; last value wins"
        );
    }
    for id in &plan.suppressed_clears {
        warn!(id = %id, "not clearing topic still published under another identifier");
    }
}
