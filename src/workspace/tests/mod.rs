//! Workspace manager tests against real git repositories


use crate::git::test_support::{commit_file, git, init_repo};
use crate::workspace::lock::{LockEvent, LockObserver};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Upstream repository plus a contributor fork with two extra commits
pub struct Upstream {
    pub dir: TempDir,
    pub origin: PathBuf,
    pub fork: PathBuf,
    pub base: String,
    pub fork_commits: Vec<String>,
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        init_repo(&origin);
        commit_file(&origin, "README.md", "# widgets\n", "initial");
        let base = commit_file(&origin, "src/main.txt", "fn main\n", "add main");

        git(dir.path(), &["clone", "-q", "origin", "fork"]);
        let fork = dir.path().join("fork");
        git(&fork, &["config", "user.name", "Fork Author"]);
        git(&fork, &["config", "user.email", "fork@example.org"]);
        let c1 = commit_file(&fork, "src/feature.txt", "feature\n", "add feature");
        let c2 = commit_file(&fork, "src/main.txt", "fn main\ncall feature\n", "wire feature");

        Self {
            dir,
            origin,
            fork,
            base,
            fork_commits: vec![c1, c2],
        }
    }

    pub fn origin_url(&self) -> String {
        self.origin.to_string_lossy().into_owned()
    }

    /// Publish the fork as a bare repository at `<forks>/<slug>.git`
    pub fn publish_fork(&self, slug: &str) -> PathBuf {
        let forks = self.dir.path().join("forks");
        let target = forks.join(format!("{}.git", slug));
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        git(
            self.dir.path(),
            &["clone", "-q", "--bare", "fork", target.to_str().unwrap()],
        );
        forks
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, LockEvent)>>,
}

impl RecordingObserver {
    pub fn events_for(&self, project_key: &str) -> Vec<LockEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key == project_key)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl LockObserver for RecordingObserver {
    fn on_lock_event(&self, project_key: &str, event: LockEvent) {
        self.events
            .lock()
            .unwrap()
            .push((project_key.to_string(), event));
    }
}
