// Worker - dequeue, simulate service time, run, report

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::MAX_SERVICE_SECONDS;
pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::{BoundedWorkQueue, QueuedItem, ServiceTimeSetting, ShutdownPolicy, TaskError};
use crate::port::{CompletionSink, ItemReport, TaskOutcome, TimeProvider};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Per-outcome totals shared by every worker of a pool
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub completed: u64,
    pub failed: u64,
    pub aborted: u64,
    pub discarded: u64,
}

impl OutcomeCounters {
    pub fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::Failed(_) => &self.failed,
            TaskOutcome::Aborted => &self.aborted,
            TaskOutcome::Discarded => &self.discarded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OutcomeCounts {
        OutcomeCounts {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Everything a worker shares with its pool
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<BoundedWorkQueue>,
    pub setting: Arc<ServiceTimeSetting>,
    pub sink: Arc<dyn CompletionSink>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub counters: Arc<OutcomeCounters>,
    /// Real duration of one simulated second
    pub service_unit: Duration,
}

/// One long-lived pool slot
pub struct Worker {
    id: usize,
    ctx: WorkerContext,
}

impl Worker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the worker loop until shutdown, returning the number of items handled.
    ///
    /// Under `Drain` the worker keeps taking items until the queue is closed
    /// and empty. Under `Discard` and `Abort` it stops before the next item.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> u64 {
        info!(worker_id = self.id, "Worker started");
        let mut processed = 0;

        loop {
            if let Some(policy) = shutdown.requested() {
                if policy != ShutdownPolicy::Drain {
                    info!(worker_id = self.id, %policy, "Worker stopping before next item");
                    break;
                }
            }

            let next = if shutdown.is_shutdown() {
                self.ctx.queue.dequeue_blocking().await
            } else {
                tokio::select! {
                    next = self.ctx.queue.dequeue_blocking() => next,
                    _ = shutdown.wait() => continue,
                }
            };

            let Some(queued) = next else {
                info!(worker_id = self.id, "Queue closed and empty");
                break;
            };

            self.process(queued, &mut shutdown).await;
            processed += 1;
        }

        info!(worker_id = self.id, processed, "Worker stopped");
        processed
    }

    /// Handle one dequeued item. Item failures and panics end up in the report.
    async fn process(&self, queued: QueuedItem, shutdown: &mut ShutdownToken) {
        let QueuedItem { seq, item } = queued;
        let (action, label) = item.into_parts();

        let service_seconds = self.ctx.setting.get();
        let delay = service_delay(self.ctx.service_unit, service_seconds);
        debug!(
            worker_id = self.id,
            item_seq = seq,
            service_seconds,
            "Processing item"
        );

        let aborted = if delay.is_zero() {
            false
        } else {
            tokio::select! {
                _ = sleep(delay) => false,
                _ = shutdown.aborted() => true,
            }
        };

        let outcome = if aborted {
            TaskOutcome::Aborted
        } else {
            match execute_guarded(AssertUnwindSafe(action)) {
                PanicGuardResult::Success(Ok(())) => TaskOutcome::Completed,
                PanicGuardResult::Success(Err(e)) => TaskOutcome::Failed(e),
                PanicGuardResult::Panicked(msg) => TaskOutcome::Failed(TaskError::Panicked(msg)),
            }
        };

        self.ctx.counters.record(&outcome);

        // Outside the guard: a panicking sink is a worker fault, not an item fault
        self.ctx.sink.on_outcome(&ItemReport {
            worker_id: Some(self.id),
            seq,
            label,
            outcome,
            service_seconds: Some(service_seconds),
            finished_at_millis: self.ctx.time_provider.now_millis(),
        });
    }
}

/// Simulated seconds scaled by the unit, clamped to `MAX_SERVICE_SECONDS`
pub fn service_delay(unit: Duration, service_seconds: i64) -> Duration {
    let seconds = service_seconds.clamp(0, MAX_SERVICE_SECONDS);
    unit.saturating_mul(u32::try_from(seconds).unwrap_or(u32::MAX))
}
