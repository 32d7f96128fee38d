//! Composition root
//!
//! Builds the credential pool, commit source, workspace manager, scanner,
//! job store, queue and coordinator from one `PipelineConfig`, and runs jobs
//! through the worker pool.

use crate::app::cli::PipelineConfig;
use crate::app::error::{AppError, AppResult};
use crate::core::shutdown::ShutdownCoordinator;
use crate::github::{CredentialPool, GithubClient, ReqwestTransport};
use crate::jobs::{
    CoordinatorError, JobStore, MemoryJobStore, NewScanJob, Project, Reconciler, ScanCoordinator,
    ScanJob, WorkerPool,
};
use crate::queue::MemoryQueue;
use crate::scanner::{CommitRunner, CommitScanner, DirectoryArchive, SonarTarget};
use crate::workspace::WorkspaceManager;
use std::sync::Arc;
use std::time::Duration;

const JOB_POLL_INTERVAL: Duration = Duration::from_millis(200);
const TARGET_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Pipeline {
    config: PipelineConfig,
    workspace: Arc<WorkspaceManager>,
    target: Arc<SonarTarget>,
    store: Arc<MemoryJobStore>,
    queue: Arc<MemoryQueue>,
    coordinator: Arc<ScanCoordinator>,
}

impl Pipeline {
    /// Wire the production scanner
    pub fn build(config: PipelineConfig) -> AppResult<Self> {
        let workspace = Arc::new(build_workspace(&config)?);
        let target = Arc::new(SonarTarget::new(
            &config.scanner.host,
            &config.scanner.token,
            TARGET_TIMEOUT,
        )?);
        let mut runner = CommitRunner::new(
            &config.scanner.instance,
            workspace.clone(),
            target.clone(),
            config.scanner_settings(),
        );
        if let Some(dir) = config
            .scanner
            .log_archive_dir
            .as_ref()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            runner = runner.with_archive(Arc::new(DirectoryArchive::new(dir)));
        }
        Ok(Self::assemble(config, workspace, target, Arc::new(runner)))
    }

    /// Wire a caller-supplied scanner in place of the production one
    pub fn with_scanner(config: PipelineConfig, scanner: Arc<dyn CommitScanner>) -> AppResult<Self> {
        let workspace = Arc::new(build_workspace(&config)?);
        let target = Arc::new(SonarTarget::new(
            &config.scanner.host,
            &config.scanner.token,
            TARGET_TIMEOUT,
        )?);
        Ok(Self::assemble(config, workspace, target, scanner))
    }

    fn assemble(
        config: PipelineConfig,
        workspace: Arc<WorkspaceManager>,
        target: Arc<SonarTarget>,
        scanner: Arc<dyn CommitScanner>,
    ) -> Self {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let coordinator = Arc::new(
            ScanCoordinator::new(store.clone(), queue.clone(), scanner)
                .with_settings(config.coordinator_settings()),
        );
        Self {
            config,
            workspace,
            target,
            store,
            queue,
            coordinator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Arc<WorkspaceManager> {
        &self.workspace
    }

    pub fn target(&self) -> &Arc<SonarTarget> {
        &self.target
    }

    pub fn store(&self) -> &Arc<MemoryJobStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<ScanCoordinator> {
        &self.coordinator
    }

    /// Register `project`, enqueue `job` and drive workers until it is terminal
    ///
    /// Workers and the reconciler stop once the job settles. When `shutdown`
    /// fires first they are aborted and `Interrupted` is returned.
    pub async fn run_job(
        &self,
        project: Project,
        job: NewScanJob,
        shutdown: &ShutdownCoordinator,
    ) -> AppResult<ScanJob> {
        self.coordinator.register_project(project).await?;
        let job = self.coordinator.enqueue(job).await?;

        let workers = ShutdownCoordinator::new();
        let mut handles = WorkerPool::new(
            self.coordinator.clone(),
            self.queue.clone(),
            self.config.jobs.workers,
        )
        .spawn(&workers);
        let reconciler = Arc::new(
            Reconciler::new(self.store.clone(), self.queue.clone())
                .with_settings(self.config.reconcile_settings()),
        );
        handles.push(reconciler.spawn_periodic(workers.clone()));

        let outcome = self.wait_for_terminal(&job.id, shutdown).await;

        workers.trigger_shutdown();
        self.queue.close();
        let interrupted = matches!(outcome, Err(AppError::Interrupted { .. }));
        if interrupted {
            // An in-flight scan is dropped (killing the scanner); reconciliation reclaims the job
            handles.iter().for_each(|handle| handle.abort());
        }
        for result in futures::future::join_all(handles).await {
            match result {
                Err(e) if !e.is_cancelled() => log::warn!("Worker task ended abnormally: {}", e),
                _ => {}
            }
        }
        outcome
    }

    async fn wait_for_terminal(
        &self,
        job_id: &str,
        shutdown: &ShutdownCoordinator,
    ) -> AppResult<ScanJob> {
        loop {
            if let Some(job) = self
                .store
                .get_job(job_id)
                .await
                .map_err(CoordinatorError::from)?
            {
                if job.status.is_terminal() {
                    return Ok(job);
                }
            }
            tokio::select! {
                _ = shutdown.wait() => {
                    return Err(AppError::Interrupted { job_id: job_id.to_string() });
                }
                _ = tokio::time::sleep(JOB_POLL_INTERVAL) => {}
            }
        }
    }
}

fn build_workspace(config: &PipelineConfig) -> AppResult<WorkspaceManager> {
    let mut workspace = WorkspaceManager::new(&config.workspace.root, &config.scanner.instance)
        .with_lock_timeout(Duration::from_secs(config.workspace.lock_timeout_secs))
        .with_max_parent_hops(config.github.max_parent_hops)
        .with_fork_base_url(&config.github.fork_base_url);

    if config.github.tokens.iter().all(|token| token.trim().is_empty()) {
        log::warn!("No GitHub tokens configured; commits missing from every remote cannot be replayed");
        return Ok(workspace);
    }

    let pool = CredentialPool::new(&config.github.tokens)?
        .with_min_cooldown(chrono::Duration::seconds(config.github.min_cooldown_secs));
    let transport = ReqwestTransport::new(Duration::from_secs(config.github.timeout_secs))?;
    let client = GithubClient::new(&config.github.api_url, Arc::new(pool), Arc::new(transport))
        .with_attempts_per_credential(config.github.attempts_per_credential);
    log::debug!(
        "Commit replay enabled with {} credentials against {}",
        client.pool().size(),
        config.github.api_url
    );
    workspace = workspace.with_replayer(Arc::new(client));
    Ok(workspace)
}
