//! Dispatch seam between the job coordinator and the work queue

use crate::queue::error::QueueResult;
use async_trait::async_trait;
use std::time::Duration;

/// Task name under which scan jobs are dispatched
pub const TASK_RUN_SCAN: &str = "commitscan.run_scan_job";

/// At-least-once delivery of `(task, job_id)` pairs
///
/// A delivery may be duplicated; consumers rely on the job claim to run each
/// job at most once at a time.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Deliver `job_id` to a worker after `countdown`
    async fn dispatch(&self, task: &str, job_id: &str, countdown: Duration) -> QueueResult<()>;
}
