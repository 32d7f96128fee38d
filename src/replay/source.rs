//! Where replay fetches commit metadata and patches from

use crate::github::{CommitDetails, GithubClient, GithubResult};
use async_trait::async_trait;

#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn commit(&self, slug: &str, sha: &str) -> GithubResult<CommitDetails>;

    /// Unified diff for one commit, `git format-patch` style
    async fn patch(&self, slug: &str, sha: &str) -> GithubResult<String>;
}

#[async_trait]
impl CommitSource for GithubClient {
    async fn commit(&self, slug: &str, sha: &str) -> GithubResult<CommitDetails> {
        self.get_commit(slug, sha).await
    }

    async fn patch(&self, slug: &str, sha: &str) -> GithubResult<String> {
        self.get_commit_patch(slug, sha).await
    }
}
