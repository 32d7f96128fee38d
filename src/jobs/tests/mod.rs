//! Coordinator, reconciler and worker tests with a scripted scanner


use crate::core::time::ManualClock;
use crate::github::GithubError;
use crate::jobs::coordinator::ScanCoordinator;
use crate::jobs::store::{JobStore, MemoryJobStore};
use crate::jobs::types::{NewScanJob, Project};
use crate::queue::{QueueResult, WorkQueue};
use crate::replay::ReplayError;
use crate::scanner::{
    component_key, CommitScanResult, CommitScanner, ScanRequest, ScannerError, ScannerResult,
};
use crate::workspace::WorkspaceError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROJECT: &str = "acme_widgets";

/// What the fake scanner does on its next call
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    /// Success on a replayed commit with this effective SHA
    Replayed(String),
    ScannerCrash,
    RateLimited(DateTime<Utc>),
    MissingFork,
    /// Blocks until the gate is released, then succeeds
    Gated(Arc<tokio::sync::Notify>),
}

/// Scanner that follows a script and then keeps succeeding
#[derive(Default)]
pub struct ScriptedScanner {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ScanRequest>>,
}

impl ScriptedScanner {
    pub fn with_script(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ScanRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn success(request: &ScanRequest, effective_sha: &str, replayed: bool) -> CommitScanResult {
    CommitScanResult {
        component_key: component_key(&request.project_key, &request.commit_sha),
        effective_sha: effective_sha.to_string(),
        instance_name: "primary".to_string(),
        skipped: false,
        replayed,
        log_key: Some(format!(
            "primary/{}/{}/scan.log",
            request.project_key, request.commit_sha
        )),
        output: String::new(),
    }
}

#[async_trait]
impl CommitScanner for ScriptedScanner {
    async fn scan(&self, request: &ScanRequest) -> ScannerResult<CommitScanResult> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => Ok(success(request, &request.commit_sha, false)),
            Step::Replayed(effective) => Ok(success(request, &effective, true)),
            Step::ScannerCrash => Err(ScannerError::Failed {
                status: "exit status: 1".to_string(),
                output: "ERROR: analysis server unreachable".to_string(),
            }),
            Step::RateLimited(retry_at) => Err(ScannerError::Workspace(WorkspaceError::Replay(
                ReplayError::CredentialsExhausted {
                    sha: request.commit_sha.clone(),
                    source: GithubError::Exhausted { retry_at },
                },
            ))),
            Step::MissingFork => Err(ScannerError::Workspace(WorkspaceError::CommitUnavailable {
                sha: request.commit_sha.clone(),
                reason: "no fork slug".to_string(),
            })),
            Step::Gated(gate) => {
                gate.notified().await;
                Ok(success(request, &request.commit_sha, false))
            }
        }
    }
}

/// Queue that only records dispatches
#[derive(Default)]
pub struct RecordingQueue {
    dispatched: Mutex<Vec<(String, String, Duration)>>,
}

impl RecordingQueue {
    pub fn dispatched(&self) -> Vec<(String, String, Duration)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn countdowns_for(&self, job_id: &str) -> Vec<Duration> {
        self.dispatched()
            .into_iter()
            .filter(|(_, id, _)| id == job_id)
            .map(|(_, _, countdown)| countdown)
            .collect()
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn dispatch(&self, task: &str, job_id: &str, countdown: Duration) -> QueueResult<()> {
        self.dispatched
            .lock()
            .unwrap()
            .push((task.to_string(), job_id.to_string(), countdown));
        Ok(())
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemoryJobStore>,
    pub queue: Arc<RecordingQueue>,
    pub scanner: Arc<ScriptedScanner>,
    pub coordinator: Arc<ScanCoordinator>,
}

impl Harness {
    pub fn new(steps: Vec<Step>) -> Self {
        let clock = ManualClock::new(start_time());
        let store = Arc::new(MemoryJobStore::with_clock(Arc::new(clock.clone())));
        let queue = Arc::new(RecordingQueue::default());
        let scanner = Arc::new(ScriptedScanner::with_script(steps));
        let coordinator = Arc::new(
            ScanCoordinator::new(store.clone(), queue.clone(), scanner.clone())
                .with_clock(Arc::new(clock.clone())),
        );
        Self {
            clock,
            store,
            queue,
            scanner,
            coordinator,
        }
    }

    pub async fn with_project(self, total_commits: u64) -> Self {
        let mut project = Project::new(PROJECT, total_commits);
        project.repo_url = Some("https://github.com/acme/widgets".to_string());
        self.store.save_project(project).await.unwrap();
        self
    }

    pub async fn enqueue(&self, sha: &str, max_retries: u32) -> String {
        self.coordinator
            .enqueue(NewScanJob {
                project_key: PROJECT.to_string(),
                commit_sha: sha.to_string(),
                max_retries,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    pub async fn project(&self) -> Project {
        self.store.get_project(PROJECT).await.unwrap().unwrap()
    }
}
