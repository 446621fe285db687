//! Single-flight FIFO execution of async operations.

/// Queue engine and the future handed back to callers.
pub mod sequential;

pub use sequential::{Enqueued, OperationQueue, QueueError, QueueStatus};
