//! Job, project and failed-commit records

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static COMMIT_SHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{4,40}$").expect("valid regex"));

/// Abbreviated or full hexadecimal commit id
pub fn is_valid_commit_sha(sha: &str) -> bool {
    COMMIT_SHA.is_match(sha)
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    FailedTemp,
    FailedPermanent,
}

impl JobStatus {
    pub const CLAIMABLE: [JobStatus; 2] = [JobStatus::Pending, JobStatus::FailedTemp];

    pub fn is_claimable(self) -> bool {
        Self::CLAIMABLE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::FailedPermanent)
    }
}

/// One (project, commit) unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: String,
    pub project_key: String,
    pub commit_sha: String,
    pub repo_url: Option<String>,
    pub slug: Option<String>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// When the scheduled retry of a FAILED_TEMP job becomes due
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub config_override: Option<String>,
    pub component_key: Option<String>,
    /// Commit actually scanned; differs from `commit_sha` after replay
    pub effective_sha: Option<String>,
    pub log_key: Option<String>,
    pub instance_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewScanJob {
    pub project_key: String,
    pub commit_sha: String,
    pub repo_url: Option<String>,
    pub slug: Option<String>,
    /// 0 selects the coordinator default
    pub max_retries: u32,
    pub config_override: Option<String>,
}

/// Partial update of a job
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub retry_count: Option<u32>,
    pub last_error: Option<Option<String>>,
    pub worker_id: Option<Option<String>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub finished_at: Option<Option<DateTime<Utc>>>,
    pub next_attempt_at: Option<Option<DateTime<Utc>>>,
    pub component_key: Option<Option<String>>,
    pub effective_sha: Option<Option<String>>,
    pub log_key: Option<Option<String>>,
    pub instance_name: Option<Option<String>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn last_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }

    pub fn worker_id(mut self, worker: Option<String>) -> Self {
        self.worker_id = Some(worker);
        self
    }

    pub fn started_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn finished_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.finished_at = Some(at);
        self
    }

    pub fn next_attempt_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_attempt_at = Some(at);
        self
    }

    pub fn component_key(mut self, key: Option<String>) -> Self {
        self.component_key = Some(key);
        self
    }

    pub fn effective_sha(mut self, sha: Option<String>) -> Self {
        self.effective_sha = Some(sha);
        self
    }

    pub fn log_key(mut self, key: Option<String>) -> Self {
        self.log_key = Some(key);
        self
    }

    pub fn instance_name(mut self, name: Option<String>) -> Self {
        self.instance_name = Some(name);
        self
    }

    pub fn apply(self, job: &mut ScanJob, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(count) = self.retry_count {
            job.retry_count = count;
        }
        if let Some(value) = self.last_error {
            job.last_error = value;
        }
        if let Some(value) = self.worker_id {
            job.worker_id = value;
        }
        if let Some(value) = self.started_at {
            job.started_at = value;
        }
        if let Some(value) = self.finished_at {
            job.finished_at = value;
        }
        if let Some(value) = self.next_attempt_at {
            job.next_attempt_at = value;
        }
        if let Some(value) = self.component_key {
            job.component_key = value;
        }
        if let Some(value) = self.effective_sha {
            job.effective_sha = value;
        }
        if let Some(value) = self.log_key {
            job.log_key = value;
        }
        if let Some(value) = self.instance_name {
            job.instance_name = value;
        }
        job.updated_at = now;
    }
}

/// Guard for atomic conditional updates and queries
#[derive(Debug, Clone, Default)]
pub struct JobCondition {
    /// Empty means any status
    pub statuses: Vec<JobStatus>,
    pub started_before: Option<DateTime<Utc>>,
    /// Retry due time, or last update when none is scheduled, earlier than this
    pub due_before: Option<DateTime<Utc>>,
    /// Claim owner; set together with `claim_started_at`
    pub worker_id: Option<String>,
    pub claim_started_at: Option<DateTime<Utc>>,
}

impl JobCondition {
    pub fn status_in(statuses: &[JobStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    pub fn started_before(mut self, at: DateTime<Utc>) -> Self {
        self.started_before = Some(at);
        self
    }

    pub fn due_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_before = Some(at);
        self
    }

    /// Still RUNNING under the claim recorded in `job`
    pub fn held_by(job: &ScanJob) -> Self {
        Self {
            statuses: vec![JobStatus::Running],
            worker_id: job.worker_id.clone(),
            claim_started_at: job.started_at,
            ..Self::default()
        }
    }

    pub fn matches(&self, job: &ScanJob) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&job.status) {
            return false;
        }
        if let Some(limit) = self.started_before {
            if !job.started_at.is_some_and(|started| started < limit) {
                return false;
            }
        }
        if let Some(limit) = self.due_before {
            if job.next_attempt_at.unwrap_or(job.updated_at) >= limit {
                return false;
            }
        }
        if self.worker_id.is_some() && job.worker_id != self.worker_id {
            return false;
        }
        if self.claim_started_at.is_some() && job.started_at != self.claim_started_at {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    Processing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_key: String,
    pub repo_url: Option<String>,
    pub slug: Option<String>,
    pub total_commits: u64,
    pub processed_commits: u64,
    pub failed_commits: u64,
    pub status: ProjectStatus,
    /// Scanner properties used when a job carries no override
    pub default_config: Option<String>,
}

impl Project {
    pub fn new(project_key: &str, total_commits: u64) -> Self {
        Self {
            project_key: project_key.to_string(),
            repo_url: None,
            slug: None,
            total_commits,
            processed_commits: 0,
            failed_commits: 0,
            status: ProjectStatus::Processing,
            default_config: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_commits > 0 && self.processed_commits + self.failed_commits >= self.total_commits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailureReason {
    GithubRateLimit,
    MissingFork,
    ProjectMissing,
    InvalidCommit,
    ScanFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailedCommitStatus {
    Pending,
    Resolved,
}

/// Standing "needs attention" record for a permanently failed commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCommit {
    pub id: String,
    pub project_key: String,
    pub commit_sha: String,
    pub job_id: String,
    pub reason: FailureReason,
    pub error: String,
    pub status: FailedCommitStatus,
    /// Whether this record is included in the project's failed counter
    pub counted: bool,
    pub retry_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFailedCommit {
    pub project_key: String,
    pub commit_sha: String,
    pub job_id: String,
    pub reason: FailureReason,
    pub error: String,
}
