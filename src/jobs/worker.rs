//! Worker pool pulling scan jobs from the in-memory queue

use crate::core::shutdown::ShutdownCoordinator;
use crate::jobs::coordinator::{AttemptOutcome, ScanCoordinator};
use crate::queue::{MemoryQueue, TASK_RUN_SCAN};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// `<host>-<pid>-w<index>`
pub fn worker_identity(index: usize) -> String {
    format!("{}-{}-w{}", hostname(), std::process::id(), index)
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        let mut buffer = [0u8; 256];
        // SAFETY: the buffer outlives the call and its length is passed along
        let result = unsafe { libc::gethostname(buffer.as_mut_ptr().cast(), buffer.len()) };
        if result == 0 {
            let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
            let name = String::from_utf8_lossy(&buffer[..end]).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

pub struct WorkerPool {
    coordinator: Arc<ScanCoordinator>,
    queue: Arc<MemoryQueue>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(coordinator: Arc<ScanCoordinator>, queue: Arc<MemoryQueue>, workers: usize) -> Self {
        Self {
            coordinator,
            queue,
            workers: workers.max(1),
        }
    }

    /// Start the workers; each stops on shutdown or when the queue closes
    pub fn spawn(&self, shutdown: &ShutdownCoordinator) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|index| {
                let identity = worker_identity(index);
                let coordinator = Arc::clone(&self.coordinator);
                let queue = Arc::clone(&self.queue);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    log::debug!("Worker {} started", identity);
                    run_worker(&identity, &coordinator, &queue, &shutdown).await;
                    log::debug!("Worker {} stopped", identity);
                })
            })
            .collect()
    }
}

async fn run_worker(
    identity: &str,
    coordinator: &ScanCoordinator,
    queue: &MemoryQueue,
    shutdown: &ShutdownCoordinator,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.wait() => break,
            delivery = queue.receive() => delivery,
        };
        let Some(delivery) = delivery else {
            break;
        };
        if delivery.task != TASK_RUN_SCAN {
            log::warn!("{} ignoring unknown task {}", identity, delivery.task);
            continue;
        }
        match coordinator.run_attempt(&delivery.job_id, identity).await {
            Ok(AttemptOutcome::Skipped(_)) => {}
            Ok(outcome) => log::debug!(
                "{} finished attempt on {}: {}",
                identity,
                delivery.job_id,
                outcome.job().status
            ),
            Err(e) => log::error!("{} failed to process job {}: {}", identity, delivery.job_id, e),
        }
    }
}
