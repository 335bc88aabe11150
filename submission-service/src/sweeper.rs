//! Periodic removal of assignments nobody ever submitted to.
//!
//! An assignment whose subject disappears from the class service is never
//! notified here. Once such an assignment is older than the retention window
//! and still has no submissions it is deleted. Every instance may run its own
//! sweeper: deletes are conditional, so two passes racing on the same id, or a
//! pass racing a new submission, cannot remove an assignment that has work.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common_observability::ServiceMetrics;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::store::{StoreResult, SubmissionStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OrphanSweeper {
    store: Arc<dyn SubmissionStore>,
    metrics: Arc<ServiceMetrics>,
    interval: Duration,
    retention: chrono::Duration,
}

impl OrphanSweeper {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        metrics: Arc<ServiceMetrics>,
        interval: Duration,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            interval,
            retention,
        }
    }

    /// One pass with `now` as the reference time.
    ///
    /// A failed lookup fails the pass. A failed delete is logged and the
    /// pass moves on to the next candidate.
    pub async fn run_once(&self, now: DateTime<Utc>) -> StoreResult<SweepReport> {
        let timer = self.metrics.orphan_sweep_duration_seconds.start_timer();
        let cutoff = now - self.retention;
        let outcome = self.sweep(cutoff).await;
        timer.observe_duration();

        match &outcome {
            Ok(report) => {
                self.metrics.orphan_sweep_deleted_total.inc_by(report.deleted as u64);
                if report.failed > 0 {
                    self.metrics.orphan_sweep_failures_total.inc();
                }
            }
            Err(err) => {
                error!(error = %err, %cutoff, "orphan sweep failed");
                self.metrics.orphan_sweep_failures_total.inc();
            }
        }
        outcome
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> StoreResult<SweepReport> {
        let candidates = self.store.find_orphans(cutoff).await?;
        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };
        for id in candidates {
            match self.store.delete_orphan(&id, cutoff).await {
                Ok(true) => {
                    info!(assignment_id = %id, "deleted orphaned assignment");
                    report.deleted += 1;
                }
                Ok(false) => debug!(assignment_id = %id, "orphan no longer eligible"),
                Err(err) => {
                    error!(assignment_id = %id, error = %err, "failed to delete orphaned assignment");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Runs a pass on every tick until the handle is shut down. The first
    /// pass starts immediately.
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Ok(report) = self.run_once(Utc::now()).await {
                            debug!(?report, "orphan sweep finished");
                        }
                    }
                }
            }
            debug!("orphan sweeper stopped");
        });
        SweeperHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

pub struct SweeperHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop and waits for an in-flight pass to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(err) = (&mut self.task).await {
            error!(error = %err, "orphan sweeper task panicked");
        }
    }
}
