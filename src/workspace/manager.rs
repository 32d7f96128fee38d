//! Mirror and worktree lifecycle per project
//!
//! Layout under `<root>/<instance>/<project_key>/`:
//! `repo/` (persistent mirror), `worktrees/<commit>/` (one per scan attempt),
//! `configs/` (scanner overrides) and `.repo.lock`.
//!
//! Every git mutation of the mirror happens while the project lock is held.
//! Network replay traversal and the scan itself run without it.

use crate::git::{commit_exists, resolve_commit, GitCommand};
use crate::replay::{
    apply_replay_plan, build_replay_plan, CommitSource, ReplayError, ReplayPlan,
    DEFAULT_MAX_PARENT_HOPS,
};
use crate::workspace::error::{WorkspaceError, WorkspaceResult};
use crate::workspace::lock::{self, LockObserver, ProjectLockGuard, DEFAULT_LOCK_TIMEOUT};
use crate::workspace::url::{fork_url, normalize_repo_url};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FORK_BASE_URL: &str = "https://github.com";
const FORK_REMOTE: &str = "fork";

/// On-disk locations for one project
#[derive(Debug, Clone)]
pub struct ProjectWorkspace {
    pub project_key: String,
    pub root: PathBuf,
    pub mirror_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub lock_path: PathBuf,
}

impl ProjectWorkspace {
    fn new(base: &Path, project_key: &str) -> Self {
        let root = base.join(path_component(project_key));
        Self {
            project_key: project_key.to_string(),
            mirror_dir: root.join("repo"),
            worktrees_dir: root.join("worktrees"),
            configs_dir: root.join("configs"),
            lock_path: root.join(".repo.lock"),
            root,
        }
    }

    pub fn worktree_path(&self, commit_sha: &str) -> PathBuf {
        self.worktrees_dir.join(path_component(commit_sha))
    }

    fn mirror_exists(&self) -> bool {
        self.mirror_dir.join(".git").exists()
    }
}

/// A worktree ready for one scan attempt
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedCommit {
    pub path: PathBuf,
    pub requested_sha: String,
    /// Commit actually checked out; synthetic when `replayed`
    pub effective_sha: String,
    pub replayed: bool,
}

pub struct WorkspaceManager {
    base: PathBuf,
    replayer: Option<Arc<dyn CommitSource>>,
    max_parent_hops: usize,
    lock_timeout: Duration,
    observer: Option<Arc<dyn LockObserver>>,
    fork_base_url: String,
}

impl WorkspaceManager {
    pub fn new(root: impl AsRef<Path>, instance: &str) -> Self {
        Self {
            base: root.as_ref().join(path_component(instance)),
            replayer: None,
            max_parent_hops: DEFAULT_MAX_PARENT_HOPS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            observer: None,
            fork_base_url: DEFAULT_FORK_BASE_URL.to_string(),
        }
    }

    /// Commit source used to synthesize commits no remote can provide
    pub fn with_replayer(mut self, replayer: Arc<dyn CommitSource>) -> Self {
        self.replayer = Some(replayer);
        self
    }

    pub fn with_max_parent_hops(mut self, hops: usize) -> Self {
        self.max_parent_hops = hops;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_fork_base_url(mut self, base: &str) -> Self {
        self.fork_base_url = base.trim_end_matches('/').to_string();
        self
    }

    /// Locations for `project_key`, creating the directories on first use
    pub fn workspace(&self, project_key: &str) -> WorkspaceResult<ProjectWorkspace> {
        let workspace = ProjectWorkspace::new(&self.base, project_key);
        for dir in [&workspace.root, &workspace.worktrees_dir, &workspace.configs_dir] {
            std::fs::create_dir_all(dir).map_err(|e| WorkspaceError::io(dir, e))?;
        }
        Ok(workspace)
    }

    /// Clone the mirror if absent, otherwise refresh it (best effort)
    pub async fn ensure_mirror(&self, project_key: &str, repo_url: &str) -> WorkspaceResult<PathBuf> {
        let workspace = self.workspace(project_key)?;
        let url = normalize_repo_url(Some(repo_url), None).ok_or_else(|| {
            WorkspaceError::NoRepository {
                project_key: project_key.to_string(),
            }
        })?;
        let _guard = self.lock(&workspace).await?;
        self.refresh_mirror_locked(&workspace, &url).await?;
        Ok(workspace.mirror_dir)
    }

    /// Produce an isolated worktree for `commit_sha`
    ///
    /// Tries, in order: the refreshed mirror, a direct fetch by SHA from
    /// origin, a fetch from the fork remote derived from `slug`, and finally
    /// replay through the commit source.
    pub async fn materialize(
        &self,
        project_key: &str,
        commit_sha: &str,
        repo_url: Option<&str>,
        slug: Option<&str>,
    ) -> WorkspaceResult<MaterializedCommit> {
        let workspace = self.workspace(project_key)?;
        let url = normalize_repo_url(repo_url, slug).ok_or_else(|| WorkspaceError::NoRepository {
            project_key: project_key.to_string(),
        })?;

        {
            let _guard = self.lock(&workspace).await?;
            self.refresh_mirror_locked(&workspace, &url).await?;
            if self.locate_locked(&workspace, commit_sha, &url, slug).await? {
                if let Some(found) = self.checkout_present_locked(&workspace, commit_sha).await? {
                    return Ok(found);
                }
            }
        }

        let plan = match self.plan_replay_for(&workspace, commit_sha, slug).await {
            Ok(plan) => plan,
            Err(WorkspaceError::Replay(ReplayError::AlreadyPresent { .. })) => {
                // Another attempt fetched it while the lock was released
                let _guard = self.lock(&workspace).await?;
                if let Some(found) = self.checkout_present_locked(&workspace, commit_sha).await? {
                    return Ok(found);
                }
                return Err(WorkspaceError::CommitUnavailable {
                    sha: commit_sha.to_string(),
                    reason: "commit vanished from the mirror".to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let _guard = self.lock(&workspace).await?;
        let path = self
            .create_worktree_locked(&workspace, commit_sha, &plan.base_sha)
            .await?;
        let effective_sha = apply_replay_plan(&path, &plan).await?;
        log::info!(
            "{}: materialized {} as synthetic {} ({} replayed commits)",
            project_key,
            commit_sha,
            effective_sha,
            plan.len()
        );
        Ok(MaterializedCommit {
            path,
            requested_sha: commit_sha.to_string(),
            effective_sha,
            replayed: true,
        })
    }

    /// Replay plan for `commit_sha` against the current mirror, without applying it
    pub async fn plan_replay(
        &self,
        project_key: &str,
        commit_sha: &str,
        slug: &str,
    ) -> WorkspaceResult<ReplayPlan> {
        let workspace = self.workspace(project_key)?;
        if !workspace.mirror_exists() {
            return Err(WorkspaceError::CommitUnavailable {
                sha: commit_sha.to_string(),
                reason: format!("no mirror at {}", workspace.mirror_dir.display()),
            });
        }
        self.plan_replay_for(&workspace, commit_sha, Some(slug)).await
    }

    /// Remove the worktree for `commit_sha` and prune stale worktree metadata
    pub async fn discard(&self, project_key: &str, commit_sha: &str) -> WorkspaceResult<()> {
        let workspace = self.workspace(project_key)?;
        let _guard = self.lock(&workspace).await?;
        self.remove_worktree_locked(&workspace, commit_sha).await?;
        if workspace.mirror_exists() {
            GitCommand::new(["worktree", "prune"])
                .in_dir(&workspace.mirror_dir)
                .run_allow_fail()
                .await?;
        }
        log::debug!("{}: discarded worktree for {}", project_key, commit_sha);
        Ok(())
    }

    /// Write scanner override content once, keyed by its SHA-256
    pub fn ensure_override_config(&self, project_key: &str, content: &str) -> WorkspaceResult<PathBuf> {
        let workspace = self.workspace(project_key)?;
        let digest = Sha256::digest(content.as_bytes());
        let path = workspace
            .configs_dir
            .join(format!("override_{:x}.properties", digest));
        if !path.exists() {
            std::fs::write(&path, content).map_err(|e| WorkspaceError::io(&path, e))?;
        }
        Ok(path)
    }

    async fn lock(&self, workspace: &ProjectWorkspace) -> WorkspaceResult<ProjectLockGuard> {
        lock::acquire(
            &workspace.lock_path,
            &workspace.project_key,
            self.lock_timeout,
            self.observer.clone(),
        )
        .await
    }

    async fn plan_replay_for(
        &self,
        workspace: &ProjectWorkspace,
        commit_sha: &str,
        slug: Option<&str>,
    ) -> WorkspaceResult<ReplayPlan> {
        let unavailable = |reason: &str| WorkspaceError::CommitUnavailable {
            sha: commit_sha.to_string(),
            reason: reason.to_string(),
        };
        let slug = slug.ok_or_else(|| unavailable("no repository slug to replay from"))?;
        let source = self
            .replayer
            .as_ref()
            .ok_or_else(|| unavailable("no commit source configured for replay"))?;

        log::info!(
            "{}: replaying {} from {} via the commit API",
            workspace.project_key,
            commit_sha,
            slug
        );
        let mirror = workspace.mirror_dir.as_path();
        let plan = build_replay_plan(
            source.as_ref(),
            slug,
            commit_sha,
            self.max_parent_hops,
            |sha| Ok(commit_exists(mirror, sha)?),
        )
        .await?;
        Ok(plan)
    }

    async fn refresh_mirror_locked(&self, workspace: &ProjectWorkspace, url: &str) -> WorkspaceResult<()> {
        let mirror = workspace.mirror_dir.to_string_lossy().into_owned();

        if !workspace.mirror_exists() {
            if workspace.mirror_dir.exists() {
                std::fs::remove_dir_all(&workspace.mirror_dir)
                    .map_err(|e| WorkspaceError::io(&workspace.mirror_dir, e))?;
            }
            log::info!("{}: cloning {}", workspace.project_key, url);
            GitCommand::new(["clone", "--no-checkout", url, mirror.as_str()])
                .in_dir(&workspace.root)
                .run()
                .await?;
        }

        let steps: [&[&str]; 3] = [
            &["remote", "set-url", "origin", url],
            &["fetch", "origin", "+refs/pull/*/head:refs/remotes/origin/pr/*"],
            &["fetch", "--all", "--tags", "--prune"],
        ];
        for args in steps {
            let output = GitCommand::new(args.iter().copied())
                .in_dir(&workspace.mirror_dir)
                .run_allow_fail()
                .await?;
            if !output.success {
                log::warn!(
                    "{}: mirror refresh step `git {}` failed: {}",
                    workspace.project_key,
                    args.join(" "),
                    output.combined()
                );
            }
        }
        Ok(())
    }

    /// True once `commit_sha` is in the mirror, fetching it if needed
    async fn locate_locked(
        &self,
        workspace: &ProjectWorkspace,
        commit_sha: &str,
        url: &str,
        slug: Option<&str>,
    ) -> WorkspaceResult<bool> {
        let mirror = &workspace.mirror_dir;
        if commit_exists(mirror, commit_sha)? {
            return Ok(true);
        }
        log::warn!(
            "{}: commit {} not found after refresh, trying alternate fetches",
            workspace.project_key,
            commit_sha
        );

        let direct = GitCommand::new(["fetch", "origin", commit_sha])
            .in_dir(mirror)
            .run_allow_fail()
            .await?;
        if direct.success && commit_exists(mirror, commit_sha)? {
            log::info!("{}: found {} via direct fetch", workspace.project_key, commit_sha);
            return Ok(true);
        }

        if let Some(slug) = slug {
            let fork = fork_url(&self.fork_base_url, slug);
            if fork != url && self.fetch_from_fork_locked(mirror, commit_sha, &fork).await? {
                if commit_exists(mirror, commit_sha)? {
                    log::info!("{}: found {} on fork {}", workspace.project_key, commit_sha, fork);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn fetch_from_fork_locked(&self, mirror: &Path, commit_sha: &str, fork: &str) -> WorkspaceResult<bool> {
        GitCommand::new(["remote", "remove", FORK_REMOTE])
            .in_dir(mirror)
            .run_allow_fail()
            .await?;
        let added = GitCommand::new(["remote", "add", FORK_REMOTE, fork])
            .in_dir(mirror)
            .run_allow_fail()
            .await?;
        let fetched = if added.success {
            let output = GitCommand::new(["fetch", FORK_REMOTE, commit_sha])
                .in_dir(mirror)
                .run_allow_fail()
                .await?;
            if !output.success {
                log::warn!("Fetching {} from fork {} failed: {}", commit_sha, fork, output.combined());
            }
            output.success
        } else {
            false
        };
        GitCommand::new(["remote", "remove", FORK_REMOTE])
            .in_dir(mirror)
            .run_allow_fail()
            .await?;
        Ok(fetched)
    }

    async fn checkout_present_locked(
        &self,
        workspace: &ProjectWorkspace,
        commit_sha: &str,
    ) -> WorkspaceResult<Option<MaterializedCommit>> {
        let Some(full_sha) = resolve_commit(&workspace.mirror_dir, commit_sha)? else {
            return Ok(None);
        };
        let path = self
            .create_worktree_locked(workspace, commit_sha, &full_sha)
            .await?;
        log::info!("{}: materialized {} at {}", workspace.project_key, full_sha, path.display());
        Ok(Some(MaterializedCommit {
            path,
            requested_sha: commit_sha.to_string(),
            effective_sha: full_sha,
            replayed: false,
        }))
    }

    async fn create_worktree_locked(
        &self,
        workspace: &ProjectWorkspace,
        worktree_id: &str,
        rev: &str,
    ) -> WorkspaceResult<PathBuf> {
        self.remove_worktree_locked(workspace, worktree_id).await?;
        GitCommand::new(["worktree", "prune"])
            .in_dir(&workspace.mirror_dir)
            .run_allow_fail()
            .await?;

        let target = workspace.worktree_path(worktree_id);
        let target_arg = target.to_string_lossy().into_owned();
        GitCommand::new(["worktree", "add", "--detach", target_arg.as_str(), rev])
            .in_dir(&workspace.mirror_dir)
            .run()
            .await?;
        GitCommand::new(["clean", "-fdx"])
            .in_dir(&target)
            .run_allow_fail()
            .await?;
        Ok(target)
    }

    async fn remove_worktree_locked(&self, workspace: &ProjectWorkspace, worktree_id: &str) -> WorkspaceResult<()> {
        let target = workspace.worktree_path(worktree_id);
        if !target.exists() {
            return Ok(());
        }
        if workspace.mirror_exists() {
            let target_arg = target.to_string_lossy().into_owned();
            GitCommand::new(["worktree", "remove", "--force", target_arg.as_str()])
                .in_dir(&workspace.mirror_dir)
                .run_allow_fail()
                .await?;
        }
        if target.exists() {
            std::fs::remove_dir_all(&target).map_err(|e| WorkspaceError::io(&target, e))?;
        }
        Ok(())
    }
}

/// Single safe path component for keys and SHAs
fn path_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}
