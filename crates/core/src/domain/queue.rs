// Bounded Work Queue - capacity-limited FIFO hand-off between producers and workers

use super::error::{DomainError, Result};
use super::work_item::WorkItem;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::{debug, info};

/// A queued work item tagged with its admission sequence number.
///
/// `seq` is diagnostic only; ordering is the queue position.
#[derive(Debug)]
pub struct QueuedItem {
    pub seq: u64,
    pub item: WorkItem,
}

/// Snapshot of admission outcomes since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounters {
    pub accepted: u64,
    pub rejected: u64,
    pub timed_out: u64,
}

#[derive(Debug, Default)]
struct AdmissionCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
}

struct State {
    items: VecDeque<QueuedItem>,
    closed: bool,
}

/// Fixed-capacity, order-preserving queue of [`WorkItem`]s.
///
/// Capacity is accounted with two semaphores: `slots` holds one permit per
/// free position and `ready` one permit per stored item (plus a single
/// wake-up permit after [`close`](Self::close)). A producer must win a slot
/// permit before touching the storage and a consumer must win a ready permit,
/// so occupancy stays within `0..=capacity` for any interleaving. Tokio
/// semaphores hand permits to waiters in FIFO order, which keeps blocked
/// producers and consumers from starving.
pub struct BoundedWorkQueue {
    capacity: usize,
    state: Mutex<State>,
    slots: Semaphore,
    ready: Semaphore,
    next_seq: AtomicU64,
    counters: AdmissionCounters,
}

impl BoundedWorkQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(DomainError::InvalidConfiguration(format!(
                "queue capacity must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                capacity
            )));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            next_seq: AtomicU64::new(0),
            counters: AdmissionCounters::default(),
        })
    }

    /// Add `item` without waiting.
    ///
    /// Returns the admission sequence number, or `Rejected` when every slot is
    /// taken. Rejection is the normal backpressure signal, not a fault.
    pub fn try_enqueue(&self, item: WorkItem) -> Result<u64> {
        match self.slots.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.push(item)
            }
            Err(TryAcquireError::Closed) => Err(DomainError::QueueClosed),
            Err(TryAcquireError::NoPermits) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(capacity = self.capacity, "Queue full, rejecting item");
                Err(DomainError::Rejected {
                    capacity: self.capacity,
                })
            }
        }
    }

    /// Wait up to `timeout` for a free slot, then add `item`
    pub async fn enqueue_blocking(&self, item: WorkItem, timeout: Duration) -> Result<u64> {
        match tokio::time::timeout(timeout, self.slots.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                self.push(item)
            }
            Ok(Err(_)) => Err(DomainError::QueueClosed),
            Err(_) => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                debug!(capacity = self.capacity, ?timeout, "Enqueue timed out");
                Err(DomainError::EnqueueTimeout { timeout })
            }
        }
    }

    /// Wait for the oldest item and take it.
    ///
    /// Waits indefinitely while the queue is open. Returns `None` only once the
    /// queue is closed and empty.
    pub async fn dequeue_blocking(&self) -> Option<QueuedItem> {
        loop {
            // `ready` is never closed; an error here means it was torn down
            let permit = self.ready.acquire().await.ok()?;
            permit.forget();

            if let Some(next) = self.pop_after_permit() {
                return next;
            }
        }
    }

    /// Take the oldest item if one is ready right now
    pub fn try_dequeue(&self) -> Option<QueuedItem> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        self.pop_after_permit().flatten()
    }

    /// Stop admitting work. Pending items stay dequeuable.
    ///
    /// Returns false if the queue was already closed.
    pub fn close(&self) -> bool {
        let pending = {
            let mut state = self.lock_state();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.items.len()
        };

        // Wakes blocked producers with `QueueClosed`
        self.slots.close();
        // Wake-up permit: lets idle consumers observe closed-and-empty
        self.ready.add_permits(1);

        info!(capacity = self.capacity, pending, "Queue closed to new work");
        true
    }

    /// Remove and return every pending item, oldest first
    pub fn drain(&self) -> Vec<QueuedItem> {
        let drained: Vec<QueuedItem> = self.lock_state().items.drain(..).collect();

        // Consumers that already hold a permit for a drained item find the
        // storage empty and go back to waiting.
        for _ in 0..drained.len() {
            match self.ready.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(_) => break,
            }
        }
        self.slots.add_permits(drained.len());

        if !drained.is_empty() {
            debug!(count = drained.len(), "Drained pending items");
        }
        drained
    }

    /// Advisory occupancy snapshot; may be stale by the time it is read
    pub fn size(&self) -> usize {
        self.lock_state().items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    pub fn counters(&self) -> QueueCounters {
        QueueCounters {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Store an item whose slot permit has already been consumed
    fn push(&self, item: WorkItem) -> Result<u64> {
        let seq = {
            let mut state = self.lock_state();
            if state.closed {
                drop(state);
                self.slots.add_permits(1);
                return Err(DomainError::QueueClosed);
            }
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            state.items.push_back(QueuedItem { seq, item });
            seq
        };

        self.ready.add_permits(1);
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(seq)
    }

    /// Pop after a ready permit was consumed.
    ///
    /// `Some(Some(_))` is an item, `Some(None)` means closed and empty, `None`
    /// means the permit was stale (its item was drained) and the caller should
    /// wait again.
    fn pop_after_permit(&self) -> Option<Option<QueuedItem>> {
        let mut state = self.lock_state();
        if let Some(next) = state.items.pop_front() {
            drop(state);
            self.slots.add_permits(1);
            return Some(Some(next));
        }
        if state.closed {
            drop(state);
            // Pass the wake-up on to the next idle consumer
            self.ready.add_permits(1);
            return Some(None);
        }
        None
    }

    // Storage holds no invariant a panicking lock holder could break
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BoundedWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWorkQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}
