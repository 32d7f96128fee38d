//! Job store and coordinator error types

use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Job store failure: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Scan job {0} not found")]
    JobNotFound(String),

    #[error("Scan job {job_id} is already claimed or finished")]
    AlreadyClaimed { job_id: String },

    #[error("No pending failure recorded for {project_key} at {commit_sha}")]
    NoFailedCommit {
        project_key: String,
        commit_sha: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
