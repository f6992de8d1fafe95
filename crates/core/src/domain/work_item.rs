// Work Item - an opaque, owned unit of executable work

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a single work item. Never propagated back to the producer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

pub type TaskResult = std::result::Result<(), TaskError>;

type Action = Box<dyn FnOnce() -> TaskResult + Send + 'static>;

/// A zero-argument action handed from a producer to exactly one worker.
///
/// The queue owns the item from enqueue until a worker dequeues it; the worker
/// then owns it until the action returns.
pub struct WorkItem {
    action: Action,
    label: Option<String>,
}

impl WorkItem {
    /// Wrap a fallible action
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        Self {
            action: Box::new(action),
            label: None,
        }
    }

    /// Wrap an action that cannot fail
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(move || {
            f();
            Ok(())
        })
    }

    /// An item whose only cost is the simulated service time
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    /// Attach a label that shows up in logs and completion reports
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn into_parts(self) -> (Action, Option<String>) {
        (self.action, self.label)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
