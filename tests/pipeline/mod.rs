mod materialize;
mod scan_jobs;

use crate::common::{ForkedRepo, RepoSource};
use async_trait::async_trait;
use commitscan::scanner::ScanTarget;
use commitscan::workspace::WorkspaceManager;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const PROJECT: &str = "acme_widgets";

/// Analysis server that has never seen any component
#[derive(Default)]
pub struct EmptyTarget {
    lookups: AtomicUsize,
}

impl EmptyTarget {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanTarget for EmptyTarget {
    async fn component_exists(&self, _component_key: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        false
    }
}

/// A fork fixture with a workspace manager that replays from it
pub struct Setup {
    pub repo: ForkedRepo,
    pub root: TempDir,
    pub source: Arc<RepoSource>,
    pub workspace: Arc<WorkspaceManager>,
}

impl Setup {
    pub fn new() -> Self {
        let repo = ForkedRepo::new();
        let root = TempDir::new().unwrap();
        let source = Arc::new(RepoSource::new(&repo.fork));
        let workspace = Arc::new(
            WorkspaceManager::new(root.path(), "it")
                .with_replayer(source.clone())
                .with_fork_base_url(&repo.empty_fork_host()),
        );
        Self {
            repo,
            root,
            source,
            workspace,
        }
    }

    pub fn worktree(&self, sha: &str) -> std::path::PathBuf {
        self.workspace.workspace(PROJECT).unwrap().worktree_path(sha)
    }
}
