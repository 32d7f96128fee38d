//! Workspace error types

use crate::git::GitError;
use crate::replay::ReplayError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Timed out after {waited_secs}s waiting for the workspace lock of {project_key}")]
    LockTimeout {
        project_key: String,
        waited_secs: u64,
    },

    #[error("Lock file {path} could not be locked: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository URL or slug is required to clone project {project_key}")]
    NoRepository { project_key: String },

    #[error("Commit {sha} is missing from origin and cannot be replayed: {reason}")]
    CommitUnavailable { sha: String, reason: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
