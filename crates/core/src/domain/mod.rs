// Domain Layer - Queue, setting and work item primitives

pub mod config;
pub mod error;
pub mod queue;
pub mod setting;
pub mod work_item;

#[cfg(test)]
mod queue_test;

// Re-exports
pub use config::{PoolConfig, RestartPolicy, ShutdownPolicy};
pub use error::DomainError;
pub use queue::{BoundedWorkQueue, QueueCounters, QueuedItem};
pub use setting::{ServiceTimeSetting, DEFAULT_SERVICE_SECONDS};
pub use work_item::{TaskError, TaskResult, WorkItem};
