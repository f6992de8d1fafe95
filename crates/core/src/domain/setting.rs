// Service Time Setting - the single runtime-tunable value

use super::error::{DomainError, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::watch;
use tracing::info;

/// Simulated seconds each work item takes when nothing else is configured
pub const DEFAULT_SERVICE_SECONDS: i64 = 5;

/// Simulated per-item service time, shared between workers and a control surface.
///
/// Reads are a single atomic load, so any number of workers can call
/// [`get`](Self::get) without contending. Writes are serialized through the
/// change channel so the stored value and the last published change always
/// agree; between concurrent writers the last one to finish wins.
///
/// Construct one per pool and pass it explicitly (usually in an `Arc`).
#[derive(Debug)]
pub struct ServiceTimeSetting {
    seconds: AtomicI64,
    changes: watch::Sender<i64>,
}

impl ServiceTimeSetting {
    pub fn new(initial_seconds: i64) -> Result<Self> {
        validate(initial_seconds)?;
        let (changes, _) = watch::channel(initial_seconds);
        Ok(Self {
            seconds: AtomicI64::new(initial_seconds),
            changes,
        })
    }

    /// Current service time in simulated seconds
    pub fn get(&self) -> i64 {
        self.seconds.load(Ordering::Acquire)
    }

    /// Replace the service time, returning the previous value.
    ///
    /// Negative values are rejected with `InvalidConfiguration` and leave the
    /// stored value untouched.
    pub fn set(&self, seconds: i64) -> Result<i64> {
        validate(seconds)?;

        let mut previous = 0;
        self.changes.send_modify(|published| {
            previous = self.seconds.swap(seconds, Ordering::AcqRel);
            *published = seconds;
        });

        info!(previous, service_seconds = seconds, "Service time updated");
        Ok(previous)
    }

    /// Receiver that observes every subsequent change
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.changes.subscribe()
    }
}

impl Default for ServiceTimeSetting {
    fn default() -> Self {
        let (changes, _) = watch::channel(DEFAULT_SERVICE_SECONDS);
        Self {
            seconds: AtomicI64::new(DEFAULT_SERVICE_SECONDS),
            changes,
        }
    }
}

fn validate(seconds: i64) -> Result<()> {
    if seconds < 0 {
        return Err(DomainError::InvalidConfiguration(format!(
            "service time must be non-negative, got {}",
            seconds
        )));
    }
    Ok(())
}
