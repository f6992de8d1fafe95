// Load Generator - fixed-rate producer for demonstrating backpressure

use crate::application::worker::constants::LOAD_REPORT_INTERVAL;
use crate::application::worker::ShutdownToken;
use crate::domain::{BoundedWorkQueue, DomainError, WorkItem};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

/// Highest supported offer rate (one item per microsecond)
pub const MAX_LOAD_RATE: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub offered: u64,
    pub accepted: u64,
    pub rejected: u64,
}

impl LoadSummary {
    fn record(&mut self, accepted: bool) {
        self.offered += 1;
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// Offers no-op items to a queue at a fixed rate with `try_enqueue`,
/// counting what the queue turns away
pub struct LoadGenerator {
    queue: Arc<BoundedWorkQueue>,
    rate_per_sec: u32,
    report_interval: Duration,
}

impl LoadGenerator {
    pub fn new(queue: Arc<BoundedWorkQueue>, rate_per_sec: u32) -> Result<Self> {
        if rate_per_sec == 0 || rate_per_sec > MAX_LOAD_RATE {
            return Err(AppError::Config(format!(
                "load rate must be between 1 and {} items/sec, got {}",
                MAX_LOAD_RATE, rate_per_sec
            )));
        }
        Ok(Self {
            queue,
            rate_per_sec,
            report_interval: LOAD_REPORT_INTERVAL,
        })
    }

    pub fn with_report_interval(mut self, report_interval: Duration) -> Self {
        self.report_interval = report_interval;
        self
    }

    /// Offer items until shutdown or until the queue closes
    pub async fn run(self, mut shutdown: ShutdownToken) -> LoadSummary {
        let mut ticks = interval(Duration::from_secs(1) / self.rate_per_sec);
        let mut reports = interval(self.report_interval);
        reports.tick().await;

        let mut total = LoadSummary::default();
        let mut window = LoadSummary::default();
        info!(rate_per_sec = self.rate_per_sec, "Load generator started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticks.tick() => {
                    let item = WorkItem::noop().with_label("load");
                    let accepted = match self.queue.try_enqueue(item) {
                        Ok(_) => true,
                        Err(DomainError::Rejected { .. }) => false,
                        Err(e) => {
                            debug!(error = %e, "Queue stopped accepting load");
                            break;
                        }
                    };
                    total.record(accepted);
                    window.record(accepted);
                }
                _ = reports.tick() => {
                    info!(
                        offered = window.offered,
                        accepted = window.accepted,
                        rejected = window.rejected,
                        queue_size = self.queue.size(),
                        "Load window"
                    );
                    window = LoadSummary::default();
                }
            }
        }

        info!(
            offered = total.offered,
            accepted = total.accepted,
            rejected = total.rejected,
            "Load generator stopped"
        );
        total
    }
}
