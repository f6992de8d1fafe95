// Domain Error Types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Non-blocking admission found the queue full
    #[error("Queue full: rejected (capacity {capacity})")]
    Rejected { capacity: usize },

    /// Blocking admission gave up before a slot freed
    #[error("Enqueue timed out after {timeout:?}")]
    EnqueueTimeout { timeout: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Queue is closed")]
    QueueClosed,

    #[error("Worker {worker_id} died: {reason}")]
    WorkerDied { worker_id: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
