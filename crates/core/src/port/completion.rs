// Completion Sink Port
// Per-item outcomes leave the worker loop here; producers never see them.

use crate::domain::TaskError;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Final state of one work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed(TaskError),
    /// Still queued when the pool shut down under `Discard` or `Abort`
    Discarded,
    /// In flight when the pool shut down under `Abort`
    Aborted,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
}

/// What happened to a work item, reported once per item
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    /// `None` for items that never reached a worker
    pub worker_id: Option<usize>,
    pub seq: u64,
    pub label: Option<String>,
    pub outcome: TaskOutcome,
    /// Service time read when the worker picked the item up
    pub service_seconds: Option<i64>,
    pub finished_at_millis: i64,
}

/// Receives item outcomes and worker deaths.
///
/// Called from worker tasks, so implementations must be cheap and must not
/// block. A panic raised here escapes the per-item guard and kills the worker.
pub trait CompletionSink: Send + Sync {
    fn on_outcome(&self, report: &ItemReport);

    /// A worker left its loop abnormally
    fn on_worker_died(&self, _worker_id: usize, _reason: &str) {}
}

/// Default sink: structured log lines only
pub struct TracingCompletionSink;

impl CompletionSink for TracingCompletionSink {
    fn on_outcome(&self, report: &ItemReport) {
        match &report.outcome {
            TaskOutcome::Completed => debug!(
                worker_id = ?report.worker_id,
                item_seq = report.seq,
                label = ?report.label,
                service_seconds = ?report.service_seconds,
                "Item completed"
            ),
            TaskOutcome::Failed(e) => error!(
                worker_id = ?report.worker_id,
                item_seq = report.seq,
                label = ?report.label,
                error = %e,
                "Item failed"
            ),
            TaskOutcome::Discarded => warn!(
                item_seq = report.seq,
                label = ?report.label,
                "Item discarded at shutdown"
            ),
            TaskOutcome::Aborted => warn!(
                worker_id = ?report.worker_id,
                item_seq = report.seq,
                label = ?report.label,
                "Item aborted at shutdown"
            ),
        }
    }

    fn on_worker_died(&self, worker_id: usize, reason: &str) {
        error!(worker_id, reason, "Worker died");
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use tokio::sync::Notify;

    /// Records every report and lets tests wait for a given count
    #[derive(Default)]
    pub struct RecordingSink {
        reports: Mutex<Vec<ItemReport>>,
        deaths: Mutex<Vec<(usize, String)>>,
        notify: Notify,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reports(&self) -> Vec<ItemReport> {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn deaths(&self) -> Vec<(usize, String)> {
            self.deaths
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|r| pred(&r.outcome))
                .count()
        }

        /// Wait until at least `n` reports have arrived
        pub async fn wait_for(&self, n: usize) {
            loop {
                let notified = self.notify.notified();
                if self.reports.lock().unwrap_or_else(PoisonError::into_inner).len() >= n {
                    return;
                }
                notified.await;
            }
        }
    }

    impl CompletionSink for RecordingSink {
        fn on_outcome(&self, report: &ItemReport) {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(report.clone());
            self.notify.notify_waiters();
        }

        fn on_worker_died(&self, worker_id: usize, reason: &str) {
            self.deaths
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((worker_id, reason.to_string()));
        }
    }

    /// Forwards to a [`RecordingSink`] but panics on selected reports,
    /// killing the worker that delivered them
    pub struct PanickingSink {
        inner: RecordingSink,
        remaining_panics: AtomicUsize,
    }

    impl PanickingSink {
        pub fn new(panics: usize) -> Self {
            Self {
                inner: RecordingSink::new(),
                remaining_panics: AtomicUsize::new(panics),
            }
        }

        pub fn recorded(&self) -> &RecordingSink {
            &self.inner
        }
    }

    impl CompletionSink for PanickingSink {
        fn on_outcome(&self, report: &ItemReport) {
            self.inner.on_outcome(report);
            let armed = self
                .remaining_panics
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if armed {
                panic!("completion sink exploded on item {}", report.seq);
            }
        }

        fn on_worker_died(&self, worker_id: usize, reason: &str) {
            self.inner.on_worker_died(worker_id, reason);
        }
    }
}
