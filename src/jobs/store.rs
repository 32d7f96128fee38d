//! Job store seam and the in-process implementation
//!
//! Every method is a single atomic operation on the store. The claim is a
//! conditional update (`update_job_if`), never a read followed by a write.

use crate::core::sync::handle_mutex_poison;
use crate::core::time::{Clock, SystemClock};
use crate::jobs::error::{StoreError, StoreResult};
use crate::jobs::types::{
    FailedCommit, FailedCommitStatus, JobCondition, JobStatus, JobUpdate, NewFailedCommit,
    NewScanJob, Project, ProjectStatus, ScanJob,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: NewScanJob) -> StoreResult<ScanJob>;

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<ScanJob>>;

    /// Apply `update` only if the job currently satisfies `condition`
    ///
    /// Returns the updated job, or `None` when the condition did not hold.
    async fn update_job_if(
        &self,
        job_id: &str,
        condition: &JobCondition,
        update: JobUpdate,
    ) -> StoreResult<Option<ScanJob>>;

    async fn find_jobs(&self, condition: &JobCondition) -> StoreResult<Vec<ScanJob>>;

    /// Insert or replace a project, keeping existing counters
    async fn save_project(&self, project: Project) -> StoreResult<Project>;

    async fn get_project(&self, project_key: &str) -> StoreResult<Option<Project>>;

    /// Atomic increment; counters never go below zero
    async fn adjust_project_counters(
        &self,
        project_key: &str,
        processed_delta: i64,
        failed_delta: i64,
    ) -> StoreResult<Project>;

    async fn set_project_status(&self, project_key: &str, status: ProjectStatus)
        -> StoreResult<Project>;

    /// Create the failure record for (project, commit) or refresh the existing
    /// one back to pending; the `counted` flag is preserved
    async fn upsert_failed_commit(&self, failure: NewFailedCommit) -> StoreResult<FailedCommit>;

    async fn find_failed_commit(
        &self,
        project_key: &str,
        commit_sha: &str,
    ) -> StoreResult<Option<FailedCommit>>;

    /// Flip `counted` from false to true; `true` when this call flipped it
    async fn mark_failure_counted(&self, failure_id: &str) -> StoreResult<bool>;

    /// Move a pending record to resolved and uncount it
    ///
    /// Returns the record as it was before, or `None` if it was not pending.
    async fn resolve_failed_commit(&self, failure_id: &str) -> StoreResult<Option<FailedCommit>>;

    async fn link_retry_job(&self, failure_id: &str, job_id: &str) -> StoreResult<FailedCommit>;
}

#[derive(Default)]
struct StoreState {
    jobs: BTreeMap<String, ScanJob>,
    projects: BTreeMap<String, Project>,
    failures: BTreeMap<String, FailedCommit>,
    next_job: u64,
    next_failure: u64,
}

/// In-process store; one mutex makes every operation atomic
pub struct MemoryJobStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        handle_mutex_poison(self.state.lock(), StoreError::Internal)
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(kind: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: NewScanJob) -> StoreResult<ScanJob> {
        let now = self.clock.now();
        let mut state = self.state()?;
        state.next_job += 1;
        let record = ScanJob {
            id: format!("job-{:06}", state.next_job),
            project_key: job.project_key,
            commit_sha: job.commit_sha,
            repo_url: job.repo_url,
            slug: job.slug,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: job.max_retries,
            last_error: None,
            worker_id: None,
            started_at: None,
            finished_at: None,
            next_attempt_at: None,
            config_override: job.config_override,
            component_key: None,
            effective_sha: None,
            log_key: None,
            instance_name: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<ScanJob>> {
        Ok(self.state()?.jobs.get(job_id).cloned())
    }

    async fn update_job_if(
        &self,
        job_id: &str,
        condition: &JobCondition,
        update: JobUpdate,
    ) -> StoreResult<Option<ScanJob>> {
        let now = self.clock.now();
        let mut state = self.state()?;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| not_found("Scan job", job_id))?;
        if !condition.matches(job) {
            return Ok(None);
        }
        update.apply(job, now);
        Ok(Some(job.clone()))
    }

    async fn find_jobs(&self, condition: &JobCondition) -> StoreResult<Vec<ScanJob>> {
        Ok(self
            .state()?
            .jobs
            .values()
            .filter(|job| condition.matches(job))
            .cloned()
            .collect())
    }

    async fn save_project(&self, mut project: Project) -> StoreResult<Project> {
        let mut state = self.state()?;
        if let Some(existing) = state.projects.get(&project.project_key) {
            project.processed_commits = existing.processed_commits;
            project.failed_commits = existing.failed_commits;
        }
        state
            .projects
            .insert(project.project_key.clone(), project.clone());
        Ok(project)
    }

    async fn get_project(&self, project_key: &str) -> StoreResult<Option<Project>> {
        Ok(self.state()?.projects.get(project_key).cloned())
    }

    async fn adjust_project_counters(
        &self,
        project_key: &str,
        processed_delta: i64,
        failed_delta: i64,
    ) -> StoreResult<Project> {
        let mut state = self.state()?;
        let project = state
            .projects
            .get_mut(project_key)
            .ok_or_else(|| not_found("Project", project_key))?;
        project.processed_commits = project.processed_commits.saturating_add_signed(processed_delta);
        project.failed_commits = project.failed_commits.saturating_add_signed(failed_delta);
        Ok(project.clone())
    }

    async fn set_project_status(
        &self,
        project_key: &str,
        status: ProjectStatus,
    ) -> StoreResult<Project> {
        let mut state = self.state()?;
        let project = state
            .projects
            .get_mut(project_key)
            .ok_or_else(|| not_found("Project", project_key))?;
        project.status = status;
        Ok(project.clone())
    }

    async fn upsert_failed_commit(&self, failure: NewFailedCommit) -> StoreResult<FailedCommit> {
        let now = self.clock.now();
        let mut state = self.state()?;
        let existing = state
            .failures
            .values_mut()
            .find(|record| {
                record.project_key == failure.project_key && record.commit_sha == failure.commit_sha
            });
        if let Some(record) = existing {
            record.job_id = failure.job_id;
            record.reason = failure.reason;
            record.error = failure.error;
            record.status = FailedCommitStatus::Pending;
            record.updated_at = now;
            return Ok(record.clone());
        }

        state.next_failure += 1;
        let record = FailedCommit {
            id: format!("failed-{:06}", state.next_failure),
            project_key: failure.project_key,
            commit_sha: failure.commit_sha,
            job_id: failure.job_id,
            reason: failure.reason,
            error: failure.error,
            status: FailedCommitStatus::Pending,
            counted: false,
            retry_job_id: None,
            created_at: now,
            updated_at: now,
        };
        state.failures.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_failed_commit(
        &self,
        project_key: &str,
        commit_sha: &str,
    ) -> StoreResult<Option<FailedCommit>> {
        Ok(self
            .state()?
            .failures
            .values()
            .find(|record| record.project_key == project_key && record.commit_sha == commit_sha)
            .cloned())
    }

    async fn mark_failure_counted(&self, failure_id: &str) -> StoreResult<bool> {
        let mut state = self.state()?;
        let record = state
            .failures
            .get_mut(failure_id)
            .ok_or_else(|| not_found("Failed commit", failure_id))?;
        if record.counted {
            return Ok(false);
        }
        record.counted = true;
        Ok(true)
    }

    async fn resolve_failed_commit(&self, failure_id: &str) -> StoreResult<Option<FailedCommit>> {
        let now = self.clock.now();
        let mut state = self.state()?;
        let record = state
            .failures
            .get_mut(failure_id)
            .ok_or_else(|| not_found("Failed commit", failure_id))?;
        if record.status != FailedCommitStatus::Pending {
            return Ok(None);
        }
        let before = record.clone();
        record.status = FailedCommitStatus::Resolved;
        record.counted = false;
        record.updated_at = now;
        Ok(Some(before))
    }

    async fn link_retry_job(&self, failure_id: &str, job_id: &str) -> StoreResult<FailedCommit> {
        let now = self.clock.now();
        let mut state = self.state()?;
        let record = state
            .failures
            .get_mut(failure_id)
            .ok_or_else(|| not_found("Failed commit", failure_id))?;
        record.retry_job_id = Some(job_id.to_string());
        record.updated_at = now;
        Ok(record.clone())
    }
}
