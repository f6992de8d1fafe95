//! Daemon configuration from `SLOWPOKE_*` environment variables

use anyhow::{Context, Result};
use slowpoke_api_rpc::RpcServerConfig;
use slowpoke_core::domain::{PoolConfig, RestartPolicy, ShutdownPolicy, DEFAULT_SERVICE_SECONDS};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub pool: PoolConfig,
    pub service_seconds: i64,
    pub rpc: RpcServerConfig,
    /// Items per second offered by the built-in load generator; 0 disables it
    pub load_rate: u32,
    /// How often pool stats are logged; zero disables it
    pub stats_interval: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take defaults, malformed ones are errors
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = PoolConfig::default();
        let rpc_defaults = RpcServerConfig::default();

        let pool = PoolConfig {
            workers: parse_or(&lookup, "SLOWPOKE_WORKERS", defaults.workers)?,
            queue_capacity: parse_or(&lookup, "SLOWPOKE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            service_unit: Duration::from_millis(parse_or(
                &lookup,
                "SLOWPOKE_SERVICE_UNIT_MS",
                defaults.service_unit.as_millis() as u64,
            )?),
            shutdown_policy: parse_or::<ShutdownPolicy>(
                &lookup,
                "SLOWPOKE_SHUTDOWN_POLICY",
                defaults.shutdown_policy,
            )?,
            restart_policy: parse_or::<RestartPolicy>(
                &lookup,
                "SLOWPOKE_RESTART_POLICY",
                defaults.restart_policy,
            )?,
        };
        pool.validate().context("Invalid pool configuration")?;

        let config = Self {
            pool,
            service_seconds: parse_or(&lookup, "SLOWPOKE_SERVICE_SECONDS", DEFAULT_SERVICE_SECONDS)?,
            rpc: RpcServerConfig {
                host: lookup("SLOWPOKE_RPC_HOST").unwrap_or(rpc_defaults.host),
                port: parse_or(&lookup, "SLOWPOKE_RPC_PORT", rpc_defaults.port)?,
            },
            load_rate: parse_or(&lookup, "SLOWPOKE_LOAD_RATE", 0)?,
            stats_interval: Duration::from_secs(parse_or(
                &lookup,
                "SLOWPOKE_STATS_INTERVAL_SECS",
                10,
            )?),
        };
        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}={:?}: {}", key, raw, e)),
    }
}
