//! Reconciliation sweep for abandoned and stuck jobs

use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::{Clock, SystemClock};
use crate::jobs::error::CoordinatorResult;
use crate::jobs::store::JobStore;
use crate::jobs::types::{JobCondition, JobStatus, JobUpdate};
use crate::queue::{WorkQueue, TASK_RUN_SCAN};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// RUNNING jobs started before now minus this are presumed abandoned
    pub running_stale: chrono::Duration,
    /// PENDING/FAILED_TEMP jobs untouched for this long are presumed lost
    pub queued_stale: chrono::Duration,
    pub interval: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            running_stale: chrono::Duration::minutes(15),
            queued_stale: chrono::Duration::minutes(60),
            interval: Duration::from_secs(600),
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    clock: Arc<dyn Clock>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            store,
            queue,
            clock: Arc::new(SystemClock),
            settings: ReconcileSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: ReconcileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reset stale jobs to PENDING and redispatch them; returns how many
    pub async fn sweep(&self) -> CoordinatorResult<usize> {
        let now = self.clock.now();
        let stale_running = JobCondition::status_in(&[JobStatus::Running])
            .started_before(now - self.settings.running_stale);
        let stuck_queued = JobCondition::status_in(&JobStatus::CLAIMABLE)
            .due_before(now - self.settings.queued_stale);

        let mut requeued = 0;
        for condition in [stale_running, stuck_queued] {
            for job in self.store.find_jobs(&condition).await? {
                let reset = JobUpdate::new()
                    .status(JobStatus::Pending)
                    .worker_id(None)
                    .next_attempt_at(None);
                // Same guard again: the job may have finished since the query
                if self
                    .store
                    .update_job_if(&job.id, &condition, reset)
                    .await?
                    .is_none()
                {
                    continue;
                }
                self.queue
                    .dispatch(TASK_RUN_SCAN, &job.id, Duration::ZERO)
                    .await?;
                log::warn!(
                    "Requeued stalled scan job {} ({} since {})",
                    job.id,
                    job.status,
                    job.started_at.unwrap_or(job.updated_at)
                );
                requeued += 1;
            }
        }
        if requeued > 0 {
            log::info!("Requeued {} stalled scan jobs", requeued);
        }
        Ok(requeued)
    }

    /// Sweep on the configured interval until shutdown
    pub fn spawn_periodic(self: Arc<Self>, shutdown: ShutdownCoordinator) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            log::error!("Reconciliation sweep failed: {}", e);
                        }
                    }
                }
            }
            log::debug!("Reconciler stopped");
        })
    }
}
