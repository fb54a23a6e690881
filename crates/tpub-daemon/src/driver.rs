//! Cycle driver: warm-up, then fetch → reconcile → commit-or-skip → sleep.
//!
//! Cycles run strictly one after another on the driver's own task. The
//! shutdown signal is only looked at while waiting (warm-up and sleep), so a
//! cycle that has started always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tpub_reconcile::{
    reconcile, CycleFailure, CycleOutcome, FetchError, FetchErrorKind, SnapshotSource,
    TopicScheme, TrackedSet,
};
use tpub_sink::{PublishError, PublishSink};
use tpub_state::TrackingStore;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverPhase {
    /// Constructed, or warming up before the first cycle.
    Idle,
    Fetching,
    Reconciling,
    /// Cycle succeeded; the new tracked set was adopted and handed to the store.
    CommitSuccess,
    /// Cycle failed; the tracked set was left as it was.
    CommitSkipped,
    Sleeping,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverTiming {
    /// Delay before the first fetch.
    pub warmup: Duration,
    /// Delay from the end of one cycle to the start of the next.
    pub poll_interval: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    pub outcome: CycleOutcome,
    /// Whether the store accepted the new set. Always false on failure.
    pub committed: bool,
    pub duration: Duration,
}

impl CycleReport {
    fn log(&self, tracked: usize) {
        let duration_ms = self.duration.as_millis() as u64;
        match &self.outcome {
            CycleOutcome::Success { published, cleared } => info!(
                cycle = self.cycle,
                published,
                cleared,
                tracked,
                committed = self.committed,
                duration_ms,
                "cycle complete"
            ),
            CycleOutcome::Failure(failure) => info!(
                cycle = self.cycle,
                tracked,
                duration_ms,
                reason = %failure,
                "cycle failed; tracked set unchanged"
            ),
        }
    }
}

pub struct CycleDriver<Src: ?Sized, Snk: ?Sized, St: ?Sized> {
    source: Arc<Src>,
    sink: Arc<Snk>,
    store: Arc<St>,
    scheme: TopicScheme,
    timing: DriverTiming,
    tracked: TrackedSet,
    cycle: u64,
    phase: watch::Sender<DriverPhase>,
}

impl<Src, Snk, St> CycleDriver<Src, Snk, St>
where
    Src: SnapshotSource + ?Sized,
    Snk: PublishSink + ?Sized,
    St: TrackingStore + ?Sized,
{
    /// Seeds the tracked set from `store`.
    pub fn new(
        source: Arc<Src>,
        sink: Arc<Snk>,
        store: Arc<St>,
        scheme: TopicScheme,
        timing: DriverTiming,
    ) -> Self {
        let tracked = store.load();
        info!(tracked = tracked.len(), "loaded previously published identifiers");
        let (phase, _) = watch::channel(DriverPhase::Idle);

        Self {
            source,
            sink,
            store,
            scheme,
            timing,
            tracked,
            cycle: 0,
            phase,
        }
    }

    pub fn tracked(&self) -> &TrackedSet {
        &self.tracked
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn phase(&self) -> DriverPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<DriverPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: DriverPhase) {
        self.phase.send_replace(phase);
    }

    /// Run one full cycle. Never fails; the outcome is in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let started = Instant::now();

        self.set_phase(DriverPhase::Fetching);
        let snapshot = self.source.fetch().await;
        if let Err(e) = &snapshot {
            log_fetch_failure(self.cycle, e);
        }

        self.set_phase(DriverPhase::Reconciling);
        let (outcome, next) =
            reconcile(snapshot, &self.tracked, &self.scheme, &*self.sink).await;

        let committed = match &outcome {
            CycleOutcome::Success { .. } => {
                self.set_phase(DriverPhase::CommitSuccess);
                // The broker now retains exactly `next`, whether or not the
                // store accepts it.
                self.tracked = next;
                match self.store.commit(&self.tracked) {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            cycle = self.cycle,
                            error = %e,
                            "failed to persist tracked identifiers"
                        );
                        false
                    }
                }
            }
            CycleOutcome::Failure(failure) => {
                self.set_phase(DriverPhase::CommitSkipped);
                if let CycleFailure::Publish {
                    error,
                    published,
                    cleared,
                } = failure
                {
                    log_publish_failure(self.cycle, error, *published, *cleared);
                }
                false
            }
        };

        let report = CycleReport {
            cycle: self.cycle,
            outcome,
            committed,
            duration: started.elapsed(),
        };
        report.log(self.tracked.len());
        report
    }

    /// Warm up, then run cycles until `shutdown` turns true. Returns the
    /// number of cycles run.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            source = %self.source.describe(),
            sink = self.sink.name(),
            warmup_secs = self.timing.warmup.as_secs(),
            poll_secs = self.timing.poll_interval.as_secs(),
            "publisher starting"
        );

        self.set_phase(DriverPhase::Idle);
        if !sleep_or_shutdown(self.timing.warmup, &mut shutdown).await {
            loop {
                self.run_cycle().await;
                self.set_phase(DriverPhase::Sleeping);
                if sleep_or_shutdown(self.timing.poll_interval, &mut shutdown).await {
                    break;
                }
            }
        }

        self.set_phase(DriverPhase::Stopped);
        info!(cycles = self.cycle, "publisher stopped");
        self.cycle
    }
}

/// Sleep for `delay`; returns true if shutdown was requested first.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    let stop = tokio::select! {
        _ = &mut sleep => return false,
        requested = shutdown.wait_for(|stop| *stop) => requested.is_ok(),
    };
    if !stop {
        // Signal sender is gone; nothing can stop us now.
        sleep.await;
    }
    stop
}

fn log_fetch_failure(cycle: u64, e: &FetchError) {
    if e.is_transient() {
        warn!(
            cycle,
            table = %e.table,
            detail = %e.message,
            "source unreachable; retrying next poll"
        );
        return;
    }
    match e.kind {
        FetchErrorKind::SchemaMissing => error!(
            cycle,
            table = %e.table,
            detail = %e.message,
            "source table `{}` is missing",
            e.table
        ),
        FetchErrorKind::SchemaMismatch => error!(
            cycle,
            table = %e.table,
            detail = %e.message,
            "required column(s) missing in `{}`",
            e.table
        ),
        _ => error!(cycle, table = %e.table, error = %e, "fetch failed"),
    }
}

fn log_publish_failure(cycle: u64, e: &PublishError, published: usize, cleared: usize) {
    match e {
        PublishError::NotConnected { .. } | PublishError::Timeout { .. } => {
            warn!(cycle, published, cleared, error = %e, "broker unavailable; cycle aborted")
        }
        PublishError::Client { .. } => {
            error!(cycle, published, cleared, error = %e, "publish rejected; cycle aborted")
        }
    }
}
