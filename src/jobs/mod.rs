//! Scan Jobs
//!
//! Durable per-commit job records, the claim/complete state machine, project
//! accounting and failure records, the reconciliation sweep and the worker
//! pool that drives attempts off the queue.

pub mod coordinator;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod worker;

pub use coordinator::{
    AttemptOutcome, CoordinatorSettings, FailureClass, FailureKind, ScanCoordinator,
    DEFAULT_MAX_RETRIES, DEFAULT_TRANSIENT_RETRY_DELAY,
};
pub use error::{CoordinatorError, CoordinatorResult, StoreError, StoreResult};
pub use reconcile::{ReconcileSettings, Reconciler};
pub use store::{JobStore, MemoryJobStore};
pub use types::{
    is_valid_commit_sha, FailedCommit, FailedCommitStatus, FailureReason, JobCondition, JobStatus,
    JobUpdate, NewFailedCommit, NewScanJob, Project, ProjectStatus, ScanJob,
};
pub use worker::{worker_identity, WorkerPool};

#[cfg(test)]
mod tests;
