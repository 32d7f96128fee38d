//! Queue Error Types

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is closed; dropped {task} for job {job_id}")]
    Closed { task: String, job_id: String },

    #[error("Dispatch of {task} failed: {message}")]
    DispatchFailed { task: String, message: String },
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
