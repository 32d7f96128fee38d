//! In-process delayed work queue
//!
//! Deliveries with a countdown are parked on tokio timers; all workers share a
//! single receiver.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::WorkQueue;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub task: String,
    pub job_id: String,
}

pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    closed: Arc<AtomicBool>,
    delayed: Arc<AtomicUsize>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            closed: Arc::new(AtomicBool::new(false)),
            delayed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Next delivery; `None` once the queue is closed and drained
    pub async fn receive(&self) -> Option<Delivery> {
        let mut receiver = self.receiver.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return receiver.try_recv().ok();
        }
        receiver.recv().await
    }

    /// Deliveries waiting on their countdown
    pub fn delayed(&self) -> usize {
        self.delayed.load(Ordering::SeqCst)
    }

    /// Refuse new dispatches and drop parked ones when their timers fire
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn dispatch(&self, task: &str, job_id: &str, countdown: Duration) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::Closed {
                task: task.to_string(),
                job_id: job_id.to_string(),
            });
        }
        let delivery = Delivery {
            task: task.to_string(),
            job_id: job_id.to_string(),
        };
        log::debug!("Dispatching {} for job {} in {:?}", task, job_id, countdown);

        if countdown.is_zero() {
            return self
                .sender
                .send(delivery)
                .map_err(|e| QueueError::DispatchFailed {
                    task: task.to_string(),
                    message: e.to_string(),
                });
        }

        let sender = self.sender.clone();
        let closed = Arc::clone(&self.closed);
        let delayed = Arc::clone(&self.delayed);
        delayed.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(countdown).await;
            delayed.fetch_sub(1, Ordering::SeqCst);
            if closed.load(Ordering::SeqCst) {
                log::debug!("Queue closed; dropping delayed job {}", delivery.job_id);
                return;
            }
            if sender.send(delivery).is_err() {
                log::warn!("Queue receiver gone; delayed delivery lost");
            }
        });
        Ok(())
    }
}
