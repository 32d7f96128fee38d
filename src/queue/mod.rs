//! Work queue
//!
//! The coordinator dispatches job identifiers with an optional countdown;
//! workers pull deliveries and run them. Delivery is at-least-once.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{QueueError, QueueResult};
pub use memory::{Delivery, MemoryQueue};
pub use traits::{WorkQueue, TASK_RUN_SCAN};
