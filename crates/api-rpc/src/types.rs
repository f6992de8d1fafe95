//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};
use slowpoke_core::application::PoolStats;

/// settings.get.v1 - Read the service time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingResponse {
    pub service_seconds: i64,
}

/// settings.set.v1 - Replace the service time
#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub service_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSettingResponse {
    pub previous: i64,
    pub service_seconds: i64,
}

/// admin.stats.v1 - Pool and queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub pool: PoolStats,
    pub degraded: bool,
    pub uptime_seconds: u64,
}

/// work.submit.v1 - Enqueue simulated no-op work
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default = "default_count")]
    pub count: usize,
    /// Wait up to this long per item for a free slot; omitted means reject immediately
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub accepted: usize,
    pub rejected: usize,
}

/// Upper bound on items per work.submit.v1 call
pub const MAX_SUBMIT_COUNT: usize = 10_000;
