//! Replay tests and the in-memory commit source shared with workspace tests


use crate::git::test_support::{git, patch_for};
use crate::github::{CommitDetails, GithubError, GithubResult};
use crate::replay::source::CommitSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Commit source answering from fixed maps
#[derive(Default)]
pub struct FakeSource {
    commits: Mutex<HashMap<String, CommitDetails>>,
    patches: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, GithubError>>,
    requests: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sha: &str, parents: &[&str], message: &str, patch: &str) {
        self.commits
            .lock()
            .unwrap()
            .insert(sha.to_string(), details(sha, parents, message, None));
        self.patches
            .lock()
            .unwrap()
            .insert(sha.to_string(), patch.to_string());
    }

    pub fn fail(&self, sha: &str, error: GithubError) {
        self.failures.lock().unwrap().insert(sha.to_string(), error);
    }

    /// Mirror real commits of `repo` with their format-patch output and author data
    pub fn from_repo(repo: &Path, shas: &[String]) -> Self {
        let source = Self::new();
        for sha in shas {
            let parent = git(repo, &["rev-parse", &format!("{}^", sha)]);
            let message = git(repo, &["log", "-1", "--format=%B", sha]);
            let name = git(repo, &["log", "-1", "--format=%an", sha]);
            let email = git(repo, &["log", "-1", "--format=%ae", sha]);
            let date = git(repo, &["log", "-1", "--format=%aI", sha]);
            let mut commit = details(sha, &[parent.as_str()], &message, Some(&date));
            if let Some(author) = commit.commit.author.as_mut() {
                author.name = Some(name);
                author.email = Some(email);
            }
            source.commits.lock().unwrap().insert(sha.clone(), commit);
            source
                .patches
                .lock()
                .unwrap()
                .insert(sha.clone(), patch_for(repo, sha));
        }
        source
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(
        &self,
        sha: &str,
        map: &Mutex<HashMap<String, T>>,
    ) -> GithubResult<T> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().get(sha) {
            return Err(error.clone());
        }
        map.lock()
            .unwrap()
            .get(sha)
            .cloned()
            .ok_or_else(|| GithubError::Api {
                status: 404,
                path: format!("/repos/acme/widgets/commits/{}", sha),
                snippet: "{\"message\":\"Not Found\"}".to_string(),
            })
    }
}

#[async_trait]
impl CommitSource for FakeSource {
    async fn commit(&self, _slug: &str, sha: &str) -> GithubResult<CommitDetails> {
        self.lookup(sha, &self.commits)
    }

    async fn patch(&self, _slug: &str, sha: &str) -> GithubResult<String> {
        self.lookup(sha, &self.patches)
    }
}

pub fn details(sha: &str, parents: &[&str], message: &str, date: Option<&str>) -> CommitDetails {
    let parents: Vec<serde_json::Value> = parents
        .iter()
        .map(|parent| serde_json::json!({ "sha": parent }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "sha": sha,
        "parents": parents,
        "commit": {
            "message": message,
            "author": {"name": "Fork Author", "email": "fork@example.org", "date": date}
        }
    }))
    .unwrap()
}
