// Worker Pool - N workers over one bounded queue, supervised for liveness

use crate::application::worker::{
    panic_message, shutdown_channel, OutcomeCounters, OutcomeCounts, ShutdownSender,
    ShutdownToken, Worker, WorkerContext,
};
use crate::domain::{
    BoundedWorkQueue, DomainError, PoolConfig, RestartPolicy, ServiceTimeSetting, ShutdownPolicy,
};
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{CompletionSink, ItemReport, TaskOutcome, TimeProvider, TracingCompletionSink};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Observability snapshot. Fields are read independently and are advisory.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub configured_workers: usize,
    pub live_workers: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub completed: u64,
    pub failed: u64,
    pub aborted: u64,
    pub discarded: u64,
    pub worker_deaths: u64,
    pub service_seconds: i64,
    pub shutting_down: bool,
}

/// Totals at the end of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub policy: ShutdownPolicy,
    #[serde(flatten)]
    pub outcomes: OutcomeCounts,
}

/// How a worker task ended
struct WorkerExit {
    worker_id: usize,
    result: std::result::Result<u64, String>,
}

/// Decrements the live-worker count when the worker task ends, however it ends
struct LivenessGuard(Arc<AtomicUsize>);

impl LivenessGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool of workers draining one [`BoundedWorkQueue`].
///
/// Producers talk to [`queue`](Self::queue) directly; the pool never blocks
/// them. Must be started from inside a Tokio runtime.
pub struct WorkerPool {
    config: PoolConfig,
    ctx: WorkerContext,
    live_workers: Arc<AtomicUsize>,
    worker_deaths: Arc<AtomicU64>,
    shutdown_tx: ShutdownSender,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Validate `config`, build the queue and spawn the workers
    pub fn start(
        config: PoolConfig,
        setting: Arc<ServiceTimeSetting>,
        sink: Arc<dyn CompletionSink>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let ctx = WorkerContext {
            queue: Arc::new(BoundedWorkQueue::new(config.queue_capacity)?),
            setting,
            sink,
            time_provider,
            counters: Arc::new(OutcomeCounters::default()),
            service_unit: config.service_unit,
        };
        let live_workers = Arc::new(AtomicUsize::new(0));
        let worker_deaths = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, token) = shutdown_channel();

        let mut supervisor = Supervisor {
            workers: JoinSet::new(),
            next_id: 0,
            ctx: ctx.clone(),
            token,
            restart_policy: config.restart_policy,
            live_workers: live_workers.clone(),
            worker_deaths: worker_deaths.clone(),
        };
        for _ in 0..config.workers {
            supervisor.spawn_worker();
        }

        info!(
            workers = config.workers,
            capacity = config.queue_capacity,
            service_seconds = ctx.setting.get(),
            service_unit = ?config.service_unit,
            "Worker pool started"
        );

        Ok(Self {
            config,
            ctx,
            live_workers,
            worker_deaths,
            shutdown_tx,
            supervisor: Mutex::new(Some(tokio::spawn(supervisor.run()))),
        })
    }

    /// Start with log-only completion reporting and the system clock
    pub fn with_defaults(config: PoolConfig, setting: Arc<ServiceTimeSetting>) -> Result<Self> {
        Self::start(
            config,
            setting,
            Arc::new(TracingCompletionSink),
            Arc::new(SystemTimeProvider),
        )
    }

    pub fn queue(&self) -> &Arc<BoundedWorkQueue> {
        &self.ctx.queue
    }

    pub fn setting(&self) -> &Arc<ServiceTimeSetting> {
        &self.ctx.setting
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Fewer live workers than configured while still running
    pub fn is_degraded(&self) -> bool {
        !self.ctx.queue.is_closed() && self.live_workers() < self.config.workers
    }

    pub fn stats(&self) -> PoolStats {
        let admission = self.ctx.queue.counters();
        let outcomes = self.ctx.counters.snapshot();
        PoolStats {
            queue_size: self.ctx.queue.size(),
            queue_capacity: self.ctx.queue.capacity(),
            configured_workers: self.config.workers,
            live_workers: self.live_workers(),
            accepted: admission.accepted,
            rejected: admission.rejected,
            timed_out: admission.timed_out,
            completed: outcomes.completed,
            failed: outcomes.failed,
            aborted: outcomes.aborted,
            discarded: outcomes.discarded,
            worker_deaths: self.worker_deaths.load(Ordering::SeqCst),
            service_seconds: self.ctx.setting.get(),
            shutting_down: self.ctx.queue.is_closed(),
        }
    }

    /// Shut down with the configured policy
    pub async fn stop(&self) -> Result<ShutdownReport> {
        self.shutdown(self.config.shutdown_policy).await
    }

    /// Stop admitting work, apply `policy` to pending and in-flight items and
    /// wait for every worker to exit
    pub async fn shutdown(&self, policy: ShutdownPolicy) -> Result<ShutdownReport> {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| AppError::InvalidState("worker pool already shut down".to_string()))?;

        info!(%policy, pending = self.ctx.queue.size(), "Shutting down worker pool");
        self.shutdown_tx.shutdown(policy);
        self.ctx.queue.close();

        if policy != ShutdownPolicy::Drain {
            self.discard_pending();
        }

        supervisor
            .await
            .map_err(|e| AppError::Internal(format!("supervisor task failed: {}", e)))?;

        // Workers can all be gone with items left behind (deaths under
        // `RestartPolicy::Report`); those are reported, not dropped
        let stranded = self.discard_pending();
        if stranded > 0 {
            warn!(stranded, "No live workers left to drain queued items");
        }

        let report = ShutdownReport {
            policy,
            outcomes: self.ctx.counters.snapshot(),
        };
        info!(
            completed = report.outcomes.completed,
            failed = report.outcomes.failed,
            aborted = report.outcomes.aborted,
            discarded = report.outcomes.discarded,
            "Worker pool stopped"
        );
        Ok(report)
    }

    /// Report every queued item as discarded; returns how many there were
    fn discard_pending(&self) -> usize {
        let drained = self.ctx.queue.drain();
        let count = drained.len();

        for queued in drained {
            let (_, label) = queued.item.into_parts();
            let outcome = TaskOutcome::Discarded;
            self.ctx.counters.record(&outcome);

            let report = ItemReport {
                worker_id: None,
                seq: queued.seq,
                label,
                outcome,
                service_seconds: None,
                finished_at_millis: self.ctx.time_provider.now_millis(),
            };
            // Runs on the caller of `shutdown`, which still has workers to await
            let sink = &self.ctx.sink;
            if std::panic::catch_unwind(AssertUnwindSafe(|| sink.on_outcome(&report))).is_err() {
                warn!(item_seq = report.seq, "Completion sink panicked while reporting discard");
            }
        }
        count
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropped without shutdown: stop workers rather than leave them parked
        if self.shutdown_tx.shutdown(ShutdownPolicy::Abort) {
            self.ctx.queue.close();
        }
    }
}

/// Owns the worker tasks and watches them for abnormal exits
struct Supervisor {
    workers: JoinSet<WorkerExit>,
    next_id: usize,
    ctx: WorkerContext,
    token: ShutdownToken,
    restart_policy: RestartPolicy,
    live_workers: Arc<AtomicUsize>,
    worker_deaths: Arc<AtomicU64>,
}

impl Supervisor {
    fn spawn_worker(&mut self) -> usize {
        let worker_id = self.next_id;
        self.next_id += 1;

        let guard = LivenessGuard::new(self.live_workers.clone());
        let worker = Worker::new(worker_id, self.ctx.clone());
        let token = self.token.clone();

        self.workers.spawn(async move {
            let _guard = guard;
            let result = AssertUnwindSafe(worker.run(token))
                .catch_unwind()
                .await
                .map_err(|payload| panic_message(payload.as_ref()));
            WorkerExit { worker_id, result }
        });
        worker_id
    }

    async fn run(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(WorkerExit {
                    result: Ok(_),
                    ..
                }) => {}
                Ok(WorkerExit {
                    worker_id,
                    result: Err(reason),
                }) => self.on_worker_died(worker_id, reason),
                Err(join_err) => {
                    // Only happens if the task is cancelled from outside
                    self.worker_deaths.fetch_add(1, Ordering::SeqCst);
                    error!(error = %join_err, "Worker task ended without reporting");
                }
            }
        }
        info!("All workers exited");
    }

    fn on_worker_died(&mut self, worker_id: usize, reason: String) {
        self.worker_deaths.fetch_add(1, Ordering::SeqCst);
        let err = DomainError::WorkerDied {
            worker_id,
            reason: reason.clone(),
        };
        error!(
            worker_id,
            live_workers = self.live_workers.load(Ordering::SeqCst),
            error = %err,
            "Worker slot lost"
        );

        let sink = self.ctx.sink.clone();
        let notified = AssertUnwindSafe(|| sink.on_worker_died(worker_id, &reason));
        if std::panic::catch_unwind(notified).is_err() {
            warn!(worker_id, "Completion sink panicked while reporting worker death");
        }

        if self.restart_policy == RestartPolicy::Replace && self.slot_still_needed() {
            let replacement = self.spawn_worker();
            info!(
                dead_worker_id = worker_id,
                worker_id = replacement,
                "Replacement worker spawned"
            );
        }
    }

    /// A drain still needs workers while items are queued
    fn slot_still_needed(&self) -> bool {
        match self.token.requested() {
            None => true,
            Some(ShutdownPolicy::Drain) => self.ctx.queue.size() > 0,
            Some(_) => false,
        }
    }
}
