// Pool Configuration

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Real duration of one simulated service second
pub const DEFAULT_SERVICE_UNIT: Duration = Duration::from_secs(1);

/// What happens to queued and in-flight items when the pool shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Stop admitting, let workers empty the queue, then exit
    #[default]
    Drain,
    /// Stop admitting, finish in-flight items, report queued items as discarded
    Discard,
    /// Like `Discard`, and also cut short the simulated delay of in-flight items
    Abort,
}

impl ShutdownPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownPolicy::Drain => "drain",
            ShutdownPolicy::Discard => "discard",
            ShutdownPolicy::Abort => "abort",
        }
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShutdownPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drain" => Ok(ShutdownPolicy::Drain),
            "discard" => Ok(ShutdownPolicy::Discard),
            "abort" => Ok(ShutdownPolicy::Abort),
            other => Err(DomainError::InvalidConfiguration(format!(
                "unknown shutdown policy '{}' (expected drain, discard or abort)",
                other
            ))),
        }
    }
}

/// What the supervisor does when a worker dies outside its normal loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Spawn a fresh worker into the dead slot
    #[default]
    Replace,
    /// Surface the death and leave the pool running degraded
    Report,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Replace => "replace",
            RestartPolicy::Report => "report",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestartPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(RestartPolicy::Replace),
            "report" => Ok(RestartPolicy::Report),
            other => Err(DomainError::InvalidConfiguration(format!(
                "unknown restart policy '{}' (expected replace or report)",
                other
            ))),
        }
    }
}

/// Constructor-time pool configuration. Only the service time is tunable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub service_unit: Duration,
    pub shutdown_policy: ShutdownPolicy,
    pub restart_policy: RestartPolicy,
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Default::default()
        }
    }

    pub fn with_service_unit(mut self, unit: Duration) -> Self {
        self.service_unit = unit;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DomainError::InvalidConfiguration(
                "worker count must be positive".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DomainError::InvalidConfiguration(
                "queue capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            service_unit: DEFAULT_SERVICE_UNIT,
            shutdown_policy: ShutdownPolicy::default(),
            restart_policy: RestartPolicy::default(),
        }
    }
}
