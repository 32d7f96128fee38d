//! Shared fixtures for integration tests
//!
//! Repositories are built with the git CLI. `RepoSource` serves commit
//! metadata and patches out of a local fork, standing in for the GitHub API.
#![allow(dead_code)]

use async_trait::async_trait;
use commitscan::github::{CommitDetails, GithubError, GithubResult};
use commitscan::replay::CommitSource;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

pub const FORK_SLUG: &str = "contrib/widgets";

fn run_git(dir: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git")
}

/// Run git in `dir` and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = run_git(dir, args);
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).expect("Failed to create repo dir");
    git(dir, &["init", "-q"]);
    git(dir, &["checkout", "-q", "-b", "main"]);
    git(dir, &["config", "user.name", "Upstream Author"]);
    git(dir, &["config", "user.email", "upstream@example.org"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

pub fn commit_file(dir: &Path, file: &str, content: &str, message: &str) -> String {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    git(dir, &["add", "--", file]);
    git(dir, &["commit", "-q", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// An upstream repository and a fork carrying two commits upstream never saw
pub struct ForkedRepo {
    pub dir: TempDir,
    pub origin: PathBuf,
    pub fork: PathBuf,
    pub base: String,
    pub fork_commits: Vec<String>,
}

impl ForkedRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        init_repo(&origin);
        commit_file(&origin, "README.md", "# widgets\n", "initial");
        let base = commit_file(&origin, "lib/core.txt", "core v1\n", "add core");

        git(dir.path(), &["clone", "-q", "origin", "fork"]);
        let fork = dir.path().join("fork");
        git(&fork, &["config", "user.name", "Fork Author"]);
        git(&fork, &["config", "user.email", "fork@example.org"]);
        git(&fork, &["config", "commit.gpgsign", "false"]);
        let first = commit_file(&fork, "lib/extra.txt", "extra\n", "add extra module");
        let second = commit_file(&fork, "lib/core.txt", "core v2\nuses extra\n", "use extra in core");

        Self {
            dir,
            origin,
            fork,
            base,
            fork_commits: vec![first, second],
        }
    }

    pub fn origin_url(&self) -> String {
        self.origin.to_string_lossy().into_owned()
    }

    /// Fork host directory with no published forks in it
    pub fn empty_fork_host(&self) -> String {
        self.dir
            .path()
            .join("fork-host")
            .to_string_lossy()
            .into_owned()
    }

    pub fn tip(&self) -> &str {
        &self.fork_commits[self.fork_commits.len() - 1]
    }

    pub fn tree_of(&self, sha: &str) -> String {
        git(&self.fork, &["rev-parse", &format!("{}^{{tree}}", sha)])
    }
}

/// Commit source answering from a local fork repository
pub struct RepoSource {
    repo: PathBuf,
    requests: AtomicUsize,
}

impl RepoSource {
    pub fn new(repo: &Path) -> Self {
        Self {
            repo: repo.to_path_buf(),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn ensure_known(&self, slug: &str, sha: &str) -> GithubResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let lookup = run_git(&self.repo, &["cat-file", "-e", &format!("{}^{{commit}}", sha)]);
        if lookup.status.success() {
            Ok(())
        } else {
            Err(GithubError::Api {
                status: 404,
                path: format!("/repos/{}/commits/{}", slug, sha),
                snippet: "{\"message\":\"No commit found for SHA\"}".to_string(),
            })
        }
    }

    fn field(&self, sha: &str, format: &str) -> String {
        git(&self.repo, &["log", "-1", &format!("--format={}", format), sha])
    }
}

#[async_trait]
impl CommitSource for RepoSource {
    async fn commit(&self, slug: &str, sha: &str) -> GithubResult<CommitDetails> {
        self.ensure_known(slug, sha)?;
        let parents: Vec<serde_json::Value> = self
            .field(sha, "%P")
            .split_whitespace()
            .map(|parent| serde_json::json!({ "sha": parent }))
            .collect();
        let payload = serde_json::json!({
            "sha": sha,
            "parents": parents,
            "commit": {
                "message": self.field(sha, "%B"),
                "author": {
                    "name": self.field(sha, "%an"),
                    "email": self.field(sha, "%ae"),
                    "date": self.field(sha, "%aI"),
                }
            }
        });
        serde_json::from_value(payload).map_err(|e| GithubError::Decode {
            path: format!("/repos/{}/commits/{}", slug, sha),
            message: e.to_string(),
        })
    }

    async fn patch(&self, slug: &str, sha: &str) -> GithubResult<String> {
        self.ensure_known(slug, sha)?;
        let output = run_git(&self.repo, &["format-patch", "-1", "--stdout", sha]);
        if !output.status.success() {
            return Err(GithubError::Internal(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
