use super::{EmptyTarget, Setup, PROJECT};
use crate::common::FORK_SLUG;
use commitscan::core::shutdown::ShutdownCoordinator;
use commitscan::jobs::{
    CoordinatorSettings, FailureReason, JobStatus, JobStore, MemoryJobStore, NewScanJob, Project,
    ProjectStatus, ScanCoordinator, ScanJob, WorkerPool,
};
use commitscan::queue::MemoryQueue;
use commitscan::scanner::{component_key, CommitRunner, DirectoryArchive, ScannerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Stack {
    setup: Setup,
    logs: TempDir,
    archive: Arc<DirectoryArchive>,
    target: Arc<EmptyTarget>,
    store: Arc<MemoryJobStore>,
    queue: Arc<MemoryQueue>,
    coordinator: Arc<ScanCoordinator>,
}

impl Stack {
    fn new(executable: &str) -> Self {
        let setup = Setup::new();
        let logs = TempDir::new().unwrap();
        let archive = Arc::new(DirectoryArchive::new(logs.path()));
        let target = Arc::new(EmptyTarget::default());
        let mut settings = ScannerSettings::new("http://sonar.invalid:9000", "squ_it");
        settings.executable = PathBuf::from(executable);
        let runner = CommitRunner::new("it", setup.workspace.clone(), target.clone(), settings)
            .with_archive(archive.clone());

        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let coordinator = Arc::new(
            ScanCoordinator::new(store.clone(), queue.clone(), Arc::new(runner)).with_settings(
                CoordinatorSettings {
                    default_max_retries: 2,
                    transient_retry_delay: Duration::ZERO,
                },
            ),
        );
        Self {
            setup,
            logs,
            archive,
            target,
            store,
            queue,
            coordinator,
        }
    }

    async fn submit(&self, shas: &[&str]) -> Vec<String> {
        let mut project = Project::new(PROJECT, shas.len() as u64);
        project.repo_url = Some(self.setup.repo.origin_url());
        project.slug = Some(FORK_SLUG.to_string());
        self.coordinator.register_project(project).await.unwrap();

        let mut ids = Vec::new();
        for sha in shas {
            let job = self
                .coordinator
                .enqueue(NewScanJob {
                    project_key: PROJECT.to_string(),
                    commit_sha: sha.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            ids.push(job.id);
        }
        ids
    }

    /// Run two workers until every job in `ids` is terminal
    async fn drain(&self, ids: &[String]) -> Vec<ScanJob> {
        let shutdown = ShutdownCoordinator::new();
        let handles = WorkerPool::new(self.coordinator.clone(), self.queue.clone(), 2).spawn(&shutdown);

        let done = tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                let mut jobs = Vec::new();
                for id in ids {
                    jobs.push(self.store.get_job(id).await.unwrap().unwrap());
                }
                if jobs.iter().all(|job| job.status.is_terminal()) {
                    return jobs;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("jobs did not settle");

        shutdown.trigger_shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
        done
    }

    async fn project(&self) -> Project {
        self.store.get_project(PROJECT).await.unwrap().unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upstream_and_fork_commits_scan_successfully() {
    let stack = Stack::new("true");
    let base = stack.setup.repo.base.clone();
    let tip = stack.setup.repo.tip().to_string();
    let ids = stack.submit(&[base.as_str(), tip.as_str()]).await;

    let jobs = stack.drain(&ids).await;

    let (upstream, fork) = (&jobs[0], &jobs[1]);
    assert_eq!(upstream.status, JobStatus::Success);
    assert_eq!(upstream.effective_sha.as_deref(), Some(base.as_str()));
    assert_eq!(fork.status, JobStatus::Success);
    assert_eq!(fork.component_key, Some(component_key(PROJECT, &tip)));
    let effective = fork.effective_sha.clone().unwrap();
    assert_ne!(effective, tip);
    assert_eq!(fork.instance_name.as_deref(), Some("it"));

    let log_key = fork.log_key.clone().unwrap();
    assert!(stack.archive.path_for(&log_key).exists());
    assert!(stack.logs.path().read_dir().unwrap().next().is_some());

    assert!(!stack.setup.worktree(&tip).exists());
    assert!(!stack.setup.worktree(&base).exists());
    assert_eq!(stack.target.lookups(), 2);

    let project = stack.project().await;
    assert_eq!(project.processed_commits, 2);
    assert_eq!(project.failed_commits, 0);
    assert_eq!(project.status, ProjectStatus::Finished);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreplayable_commit_fails_permanently_first_time() {
    let stack = Stack::new("true");
    let unknown = "0123456789abcdef0123456789abcdef01234567";
    let ids = stack.submit(&[unknown]).await;

    let jobs = stack.drain(&ids).await;

    assert_eq!(jobs[0].status, JobStatus::FailedPermanent);
    assert_eq!(jobs[0].retry_count, 0);
    let failure = stack
        .store
        .find_failed_commit(PROJECT, unknown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.reason, FailureReason::MissingFork);
    assert!(failure.counted);

    let project = stack.project().await;
    assert_eq!(project.failed_commits, 1);
    assert_eq!(project.status, ProjectStatus::Finished);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crashing_scanner_is_retried_then_given_up() {
    let stack = Stack::new("false");
    let base = stack.setup.repo.base.clone();
    let ids = stack.submit(&[base.as_str()]).await;

    let jobs = stack.drain(&ids).await;

    let job = &jobs[0];
    assert_eq!(job.status, JobStatus::FailedPermanent);
    assert_eq!(job.retry_count, 2);
    assert!(job.last_error.is_some());
    assert!(!stack.setup.worktree(&base).exists());

    let failure = stack
        .store
        .find_failed_commit(PROJECT, &base)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.reason, FailureReason::ScanFailed);
    assert_eq!(stack.project().await.failed_commits, 1);
}
