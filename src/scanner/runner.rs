//! One scan attempt for one commit
//!
//! Idempotency check against the scan target, materialization through the
//! workspace manager, scanner run outside the project lock, log archiving and
//! unconditional worktree cleanup.

use crate::scanner::archive::{LogArchive, LogKind};
use crate::scanner::command::{ScannerCommand, ScannerSettings};
use crate::scanner::error::ScannerResult;
use crate::scanner::target::ScanTarget;
use crate::workspace::{MaterializedCommit, WorkspaceError, WorkspaceManager};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub project_key: String,
    pub commit_sha: String,
    pub repo_url: Option<String>,
    pub slug: Option<String>,
    /// Scanner properties written to an override file for this scan
    pub config_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommitScanResult {
    pub component_key: String,
    /// Commit actually scanned; the requested SHA when skipped
    pub effective_sha: String,
    pub instance_name: String,
    pub skipped: bool,
    pub replayed: bool,
    pub log_key: Option<String>,
    #[serde(skip)]
    pub output: String,
}

#[async_trait]
pub trait CommitScanner: Send + Sync {
    async fn scan(&self, request: &ScanRequest) -> ScannerResult<CommitScanResult>;
}

/// Deterministic component key for (project, commit)
pub fn component_key(project_key: &str, commit_sha: &str) -> String {
    format!("{}_{}", project_key, commit_sha)
}

pub struct CommitRunner {
    instance: String,
    workspace: Arc<WorkspaceManager>,
    target: Arc<dyn ScanTarget>,
    settings: ScannerSettings,
    archive: Option<Arc<dyn LogArchive>>,
}

impl CommitRunner {
    pub fn new(
        instance: &str,
        workspace: Arc<WorkspaceManager>,
        target: Arc<dyn ScanTarget>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            instance: instance.to_string(),
            workspace,
            target,
            settings,
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn LogArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    async fn run_scanner(
        &self,
        request: &ScanRequest,
        key: &str,
        materialized: &MaterializedCommit,
    ) -> ScannerResult<String> {
        let override_path = match request.config_override.as_deref() {
            Some(content) if !content.trim().is_empty() => Some(
                self.workspace
                    .ensure_override_config(&request.project_key, content)?,
            ),
            _ => None,
        };
        let command = ScannerCommand::for_component(
            &self.settings,
            key,
            &materialized.path,
            override_path.as_deref(),
        );
        command.run().await
    }

    async fn cleanup(&self, request: &ScanRequest, key: &str) {
        if let Err(e) = self
            .workspace
            .discard(&request.project_key, &request.commit_sha)
            .await
        {
            log::warn!("Cleanup of {} failed: {}", key, e);
        }
    }

    /// Best effort; archive failures never fail the scan
    async fn archive(&self, request: &ScanRequest, kind: LogKind, content: &str) -> Option<String> {
        let archive = self.archive.as_ref()?;
        match archive
            .store(
                &self.instance,
                &request.project_key,
                &request.commit_sha,
                kind,
                content,
            )
            .await
        {
            Ok(key) => Some(key),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }
}

#[async_trait]
impl CommitScanner for CommitRunner {
    async fn scan(&self, request: &ScanRequest) -> ScannerResult<CommitScanResult> {
        let key = component_key(&request.project_key, &request.commit_sha);

        if self.target.component_exists(&key).await {
            log::info!("Component {} already exists, skipping scan", key);
            let notice = format!("Component {} already exists; scan skipped\n", key);
            let log_key = self.archive(request, LogKind::Scan, &notice).await;
            return Ok(CommitScanResult {
                component_key: key,
                effective_sha: request.commit_sha.clone(),
                instance_name: self.instance.clone(),
                skipped: true,
                replayed: false,
                log_key,
                output: notice,
            });
        }

        let materialized = match self
            .workspace
            .materialize(
                &request.project_key,
                &request.commit_sha,
                request.repo_url.as_deref(),
                request.slug.as_deref(),
            )
            .await
        {
            Ok(materialized) => materialized,
            Err(e) => {
                // A lock timeout never created anything to clean up
                if !matches!(e, WorkspaceError::LockTimeout { .. }) {
                    self.cleanup(request, &key).await;
                }
                self.archive(request, LogKind::Error, &e.to_string()).await;
                return Err(e.into());
            }
        };

        log::info!(
            "Scanning {} (effective commit {})",
            key,
            materialized.effective_sha
        );
        let outcome = self.run_scanner(request, &key, &materialized).await;
        self.cleanup(request, &key).await;

        match outcome {
            Ok(output) => {
                let log_key = self.archive(request, LogKind::Scan, &output).await;
                log::info!("Scan of {} finished", key);
                Ok(CommitScanResult {
                    component_key: key,
                    effective_sha: materialized.effective_sha,
                    instance_name: self.instance.clone(),
                    skipped: false,
                    replayed: materialized.replayed,
                    log_key,
                    output,
                })
            }
            Err(e) => {
                let text = match e.output() {
                    Some(output) => format!("{}\n\n{}", e, output),
                    None => e.to_string(),
                };
                self.archive(request, LogKind::Error, &text).await;
                Err(e)
            }
        }
    }
}
