// Worker constants
use std::time::Duration;

/// How long the daemon waits for workers after shutdown before giving up (30s)
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Interval between load generator summaries (5s)
pub const LOAD_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on simulated seconds per item; larger settings are clamped (1 day)
pub const MAX_SERVICE_SECONDS: i64 = 24 * 60 * 60;
