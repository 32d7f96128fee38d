//! Replay error types

use crate::git::GitError;
use crate::github::GithubError;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Commit {sha} already exists locally; nothing to replay")]
    AlreadyPresent { sha: String },

    #[error("Cannot replay commit {sha} with {parents} parents (non-linear history)")]
    NonLinearHistory { sha: String, parents: usize },

    #[error("Exceeded parent traversal limit ({limit}) while replaying {sha}")]
    DepthExceeded { sha: String, limit: usize },

    #[error("Loop detected in ancestry of {sha}")]
    CycleDetected { sha: String },

    #[error("Commit {sha} is missing and cannot be replayed: {source}")]
    MissingCommit {
        sha: String,
        #[source]
        source: GithubError,
    },

    #[error("GitHub credentials exhausted while replaying {sha}: {source}")]
    CredentialsExhausted {
        sha: String,
        #[source]
        source: GithubError,
    },

    #[error("Failed to apply patch for {sha}: {output}")]
    ApplyFailed { sha: String, output: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

impl ReplayError {
    /// Credential exhaustion timestamp, when replay stopped on rate limits
    pub fn retry_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            ReplayError::CredentialsExhausted { source, .. } => source.retry_at(),
            _ => None,
        }
    }
}

pub type ReplayResult<T> = Result<T, ReplayError>;
