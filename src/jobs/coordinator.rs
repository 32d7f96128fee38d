//! Scan job state machine
//!
//! ```text
//! PENDING ──claim──▶ RUNNING ──▶ SUCCESS
//!    ▲                  │ ├────▶ FAILED_PERMANENT
//!    │                  ▼ │
//!    └──reconcile── FAILED_TEMP ──claim──▶ RUNNING
//! ```
//!
//! The coordinator is the only component that changes job status and the
//! only one that decides whether a failure is worth retrying.

use crate::core::time::{self, Clock, SystemClock};
use crate::jobs::error::{CoordinatorError, CoordinatorResult, StoreError};
use crate::jobs::store::JobStore;
use crate::jobs::types::{
    is_valid_commit_sha, FailedCommitStatus, FailureReason, JobCondition, JobStatus, JobUpdate, NewFailedCommit,
    NewScanJob, Project, ProjectStatus, ScanJob,
};
use crate::queue::{WorkQueue, TASK_RUN_SCAN};
use crate::replay::ReplayError;
use crate::scanner::{CommitScanResult, CommitScanner, ScanRequest, ScannerError};
use crate::workspace::WorkspaceError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub default_max_retries: u32,
    pub transient_retry_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_max_retries: DEFAULT_MAX_RETRIES,
            transient_retry_delay: DEFAULT_TRANSIENT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retry after the given instant when known, else after the fixed delay
    Transient { retry_at: Option<DateTime<Utc>> },
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureClass {
    pub kind: FailureKind,
    pub reason: FailureReason,
    pub message: String,
}

impl FailureClass {
    pub fn permanent(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            reason,
            message: message.into(),
        }
    }

    pub fn transient(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient { retry_at: None },
            reason,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded(ScanJob),
    /// Redispatched after `countdown`
    Retrying { job: ScanJob, countdown: Duration },
    FailedPermanently(ScanJob),
    /// Terminal or claimed by another worker; nothing was done
    Skipped(ScanJob),
}

impl AttemptOutcome {
    pub fn job(&self) -> &ScanJob {
        match self {
            AttemptOutcome::Succeeded(job)
            | AttemptOutcome::Retrying { job, .. }
            | AttemptOutcome::FailedPermanently(job)
            | AttemptOutcome::Skipped(job) => job,
        }
    }
}

pub struct ScanCoordinator {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    scanner: Arc<dyn CommitScanner>,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
}

impl ScanCoordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        scanner: Arc<dyn CommitScanner>,
    ) -> Self {
        Self {
            store,
            queue,
            scanner,
            clock: Arc::new(SystemClock),
            settings: CoordinatorSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn register_project(&self, project: Project) -> CoordinatorResult<Project> {
        Ok(self.store.save_project(project).await?)
    }

    /// Create a job and dispatch it immediately
    pub async fn enqueue(&self, mut job: NewScanJob) -> CoordinatorResult<ScanJob> {
        if job.max_retries == 0 {
            job.max_retries = self.settings.default_max_retries;
        }
        let job = self.store.insert_job(job).await?;
        self.queue
            .dispatch(TASK_RUN_SCAN, &job.id, Duration::ZERO)
            .await?;
        log::info!(
            "Queued scan job {} for {} at {}",
            job.id,
            job.project_key,
            job.commit_sha
        );
        Ok(job)
    }

    /// Move a claimable job to RUNNING for `worker_id`
    ///
    /// A single conditional update; losing a race yields `AlreadyClaimed`.
    pub async fn claim(&self, job_id: &str, worker_id: &str) -> CoordinatorResult<ScanJob> {
        let update = JobUpdate::new()
            .status(JobStatus::Running)
            .worker_id(Some(worker_id.to_string()))
            .started_at(Some(self.clock.now()))
            .finished_at(None)
            .next_attempt_at(None);
        match self
            .store
            .update_job_if(job_id, &JobCondition::status_in(&JobStatus::CLAIMABLE), update)
            .await
        {
            Ok(Some(job)) => Ok(job),
            Ok(None) => Err(CoordinatorError::AlreadyClaimed {
                job_id: job_id.to_string(),
            }),
            Err(StoreError::NotFound { .. }) => {
                Err(CoordinatorError::JobNotFound(job_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim, scan and complete one delivery of `job_id`
    pub async fn run_attempt(&self, job_id: &str, worker_id: &str) -> CoordinatorResult<AttemptOutcome> {
        let current = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| CoordinatorError::JobNotFound(job_id.to_string()))?;
        if current.status.is_terminal() {
            log::debug!("Scan job {} already {}; ignoring delivery", job_id, current.status);
            return Ok(AttemptOutcome::Skipped(current));
        }

        let job = match self.claim(job_id, worker_id).await {
            Ok(job) => job,
            Err(CoordinatorError::AlreadyClaimed { .. }) => {
                log::info!("Scan job {} is already being processed", job_id);
                let latest = self.store.get_job(job_id).await?.unwrap_or(current);
                return Ok(AttemptOutcome::Skipped(latest));
            }
            Err(e) => return Err(e),
        };
        log::info!(
            "{} claimed scan job {} (attempt {}/{})",
            worker_id,
            job.id,
            job.retry_count + 1,
            job.max_retries
        );

        let Some(project) = self.store.get_project(&job.project_key).await? else {
            return self
                .complete_failure(
                    &job,
                    FailureClass::permanent(FailureReason::ProjectMissing, "Project not found"),
                )
                .await;
        };

        if !is_valid_commit_sha(&job.commit_sha) {
            let message = format!("Invalid commit SHA '{}'", job.commit_sha);
            return self
                .complete_failure(&job, FailureClass::permanent(FailureReason::InvalidCommit, message))
                .await;
        }

        let request = ScanRequest {
            project_key: job.project_key.clone(),
            commit_sha: job.commit_sha.clone(),
            repo_url: job.repo_url.clone().or_else(|| project.repo_url.clone()),
            slug: job.slug.clone().or_else(|| project.slug.clone()),
            config_override: job
                .config_override
                .clone()
                .or_else(|| project.default_config.clone()),
        };

        match self.scanner.scan(&request).await {
            Ok(result) => self.complete_success(&job, &result).await.map(AttemptOutcome::Succeeded),
            Err(error) => {
                let class = Self::classify_failure(&error);
                self.complete_failure(&job, class).await
            }
        }
    }

    /// Record a successful attempt and account for it once
    pub async fn complete_success(
        &self,
        job: &ScanJob,
        result: &CommitScanResult,
    ) -> CoordinatorResult<ScanJob> {
        let update = JobUpdate::new()
            .status(JobStatus::Success)
            .last_error(None)
            .finished_at(Some(self.clock.now()))
            .component_key(Some(result.component_key.clone()))
            .effective_sha(Some(result.effective_sha.clone()))
            .log_key(result.log_key.clone())
            .instance_name(Some(result.instance_name.clone()));
        let Some(done) = self
            .store
            .update_job_if(&job.id, &JobCondition::held_by(job), update)
            .await?
        else {
            log::warn!(
                "Scan job {} is no longer held by this attempt; success not recorded",
                job.id
            );
            return self.current(&job.id).await;
        };

        self.account_success(&done).await?;
        log::info!(
            "Scan job {} succeeded: {} ({}{})",
            done.id,
            result.component_key,
            result.effective_sha,
            if result.skipped { ", already published" } else { "" }
        );
        Ok(done)
    }

    /// Apply the retry policy to a failed attempt
    pub async fn complete_failure(
        &self,
        job: &ScanJob,
        class: FailureClass,
    ) -> CoordinatorResult<AttemptOutcome> {
        let now = self.clock.now();
        let retry_at = match class.kind {
            FailureKind::Permanent => {
                return self
                    .fail_permanently(job, job.retry_count, &class)
                    .await
                    .map(AttemptOutcome::FailedPermanently);
            }
            FailureKind::Transient { retry_at } => retry_at,
        };

        let retry_count = job.retry_count + 1;
        if retry_count >= job.max_retries {
            log::error!(
                "Scan job {} failed permanently after {} attempts: {}",
                job.id,
                retry_count,
                class.message
            );
            return self
                .fail_permanently(job, retry_count, &class)
                .await
                .map(AttemptOutcome::FailedPermanently);
        }

        let countdown = match retry_at {
            Some(at) => time::until(at, now),
            None => self.settings.transient_retry_delay,
        };
        let due = chrono::Duration::from_std(countdown)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(now);
        let update = JobUpdate::new()
            .status(JobStatus::FailedTemp)
            .retry_count(retry_count)
            .last_error(Some(class.message.clone()))
            .finished_at(Some(now))
            .next_attempt_at(Some(due));
        let Some(failed) = self
            .store
            .update_job_if(&job.id, &JobCondition::held_by(job), update)
            .await?
        else {
            log::warn!("Scan job {} was reclaimed; late failure not recorded", job.id);
            return self.current(&job.id).await.map(AttemptOutcome::Skipped);
        };
        log::warn!(
            "Scan job {} failed temporarily (attempt {}/{}). Retrying in {}s: {}",
            failed.id,
            retry_count,
            failed.max_retries,
            countdown.as_secs(),
            class.message
        );
        self.queue.dispatch(TASK_RUN_SCAN, &failed.id, countdown).await?;
        Ok(AttemptOutcome::Retrying {
            job: failed,
            countdown,
        })
    }

    /// Sort a scan error into transient or permanent
    pub fn classify_failure(error: &ScannerError) -> FailureClass {
        let message = error.to_string();
        match error {
            ScannerError::Workspace(WorkspaceError::Replay(replay)) => match replay {
                ReplayError::CredentialsExhausted { .. } => FailureClass {
                    kind: FailureKind::Transient {
                        retry_at: replay.retry_at(),
                    },
                    reason: FailureReason::GithubRateLimit,
                    message,
                },
                ReplayError::MissingCommit { .. }
                | ReplayError::NonLinearHistory { .. }
                | ReplayError::DepthExceeded { .. }
                | ReplayError::CycleDetected { .. }
                | ReplayError::ApplyFailed { .. } => {
                    FailureClass::permanent(FailureReason::MissingFork, message)
                }
                ReplayError::AlreadyPresent { .. } | ReplayError::Git(_) => {
                    FailureClass::transient(FailureReason::ScanFailed, message)
                }
            },
            ScannerError::Workspace(WorkspaceError::CommitUnavailable { .. }) => {
                FailureClass::permanent(FailureReason::MissingFork, message)
            }
            ScannerError::Workspace(WorkspaceError::NoRepository { .. }) => {
                FailureClass::permanent(FailureReason::ProjectMissing, message)
            }
            ScannerError::Failed { output, .. } => {
                let text = format!("{}\n{}", message, output).to_lowercase();
                if text.contains("commit") && text.contains("not found") {
                    FailureClass::permanent(FailureReason::ScanFailed, message)
                } else {
                    FailureClass::transient(FailureReason::ScanFailed, message)
                }
            }
            _ => FailureClass::transient(FailureReason::ScanFailed, message),
        }
    }

    /// Start a fresh job for a commit whose failure needs attention
    ///
    /// The failed job stays terminal; the new job is linked from the record.
    pub async fn requeue_failed_commit(
        &self,
        project_key: &str,
        commit_sha: &str,
        config_override: Option<String>,
    ) -> CoordinatorResult<ScanJob> {
        let record = self
            .store
            .find_failed_commit(project_key, commit_sha)
            .await?
            .filter(|record| record.status == FailedCommitStatus::Pending)
            .ok_or_else(|| CoordinatorError::NoFailedCommit {
                project_key: project_key.to_string(),
                commit_sha: commit_sha.to_string(),
            })?;
        let previous = self.store.get_job(&record.job_id).await?;

        let job = NewScanJob {
            project_key: project_key.to_string(),
            commit_sha: commit_sha.to_string(),
            repo_url: previous.as_ref().and_then(|job| job.repo_url.clone()),
            slug: previous.as_ref().and_then(|job| job.slug.clone()),
            max_retries: previous.as_ref().map(|job| job.max_retries).unwrap_or(0),
            config_override: config_override
                .or_else(|| previous.as_ref().and_then(|job| job.config_override.clone())),
        };
        let job = self.enqueue(job).await?;
        self.store.link_retry_job(&record.id, &job.id).await?;
        log::info!(
            "Requeued failed commit {} of {} as job {}",
            commit_sha,
            project_key,
            job.id
        );
        Ok(job)
    }

    async fn fail_permanently(
        &self,
        job: &ScanJob,
        retry_count: u32,
        class: &FailureClass,
    ) -> CoordinatorResult<ScanJob> {
        let update = JobUpdate::new()
            .status(JobStatus::FailedPermanent)
            .retry_count(retry_count)
            .last_error(Some(class.message.clone()))
            .finished_at(Some(self.clock.now()));
        let (failed, needs_accounting) = match self
            .store
            .update_job_if(&job.id, &JobCondition::held_by(job), update)
            .await?
        {
            Some(failed) => (failed, true),
            None => {
                // Duplicate completion: only finish accounting that never happened
                let current = self.current(&job.id).await?;
                let pending = current.status == JobStatus::FailedPermanent
                    && !self.failure_recorded_for(&current).await?;
                (current, pending)
            }
        };
        if needs_accounting {
            self.account_permanent_failure(&failed, class).await?;
        }
        Ok(failed)
    }

    async fn failure_recorded_for(&self, job: &ScanJob) -> CoordinatorResult<bool> {
        Ok(self
            .store
            .find_failed_commit(&job.project_key, &job.commit_sha)
            .await?
            .is_some_and(|record| record.job_id == job.id))
    }

    async fn account_success(&self, job: &ScanJob) -> CoordinatorResult<()> {
        if self.store.get_project(&job.project_key).await?.is_none() {
            return Ok(());
        }
        let mut failed_delta = 0;
        if let Some(record) = self
            .store
            .find_failed_commit(&job.project_key, &job.commit_sha)
            .await?
        {
            if let Some(before) = self.store.resolve_failed_commit(&record.id).await? {
                if before.counted {
                    failed_delta = -1;
                }
            }
        }
        self.store
            .adjust_project_counters(&job.project_key, 1, failed_delta)
            .await?;
        self.check_project_completion(&job.project_key).await
    }

    async fn account_permanent_failure(
        &self,
        job: &ScanJob,
        class: &FailureClass,
    ) -> CoordinatorResult<()> {
        let record = self
            .store
            .upsert_failed_commit(NewFailedCommit {
                project_key: job.project_key.clone(),
                commit_sha: job.commit_sha.clone(),
                job_id: job.id.clone(),
                reason: class.reason,
                error: class.message.clone(),
            })
            .await?;
        if self.store.get_project(&job.project_key).await?.is_none() {
            return Ok(());
        }
        if self.store.mark_failure_counted(&record.id).await? {
            self.store
                .adjust_project_counters(&job.project_key, 0, 1)
                .await?;
        }
        self.check_project_completion(&job.project_key).await
    }

    async fn check_project_completion(&self, project_key: &str) -> CoordinatorResult<()> {
        let Some(project) = self.store.get_project(project_key).await? else {
            return Ok(());
        };
        if project.is_complete() && project.status != ProjectStatus::Finished {
            self.store
                .set_project_status(project_key, ProjectStatus::Finished)
                .await?;
            log::info!(
                "Project {} finished: {} processed, {} failed of {}",
                project_key,
                project.processed_commits,
                project.failed_commits,
                project.total_commits
            );
        }
        Ok(())
    }

    async fn current(&self, job_id: &str) -> CoordinatorResult<ScanJob> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| CoordinatorError::JobNotFound(job_id.to_string()))
    }
}
