//! SlowPoke - Main Entry Point
//! Bounded work queue + worker pool with a service time tunable at runtime

mod config;

use anyhow::{Context, Result};
use config::DaemonConfig;
use slowpoke_api_rpc::RpcServer;
use slowpoke_core::application::worker::constants::SHUTDOWN_GRACE_PERIOD;
use slowpoke_core::application::{LoadGenerator, WorkerPool};
use slowpoke_core::domain::ServiceTimeSetting;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("SlowPoke v{} starting...", VERSION);

    // 2. Load configuration
    let config = DaemonConfig::from_env().context("Failed to load configuration")?;
    info!(
        workers = config.pool.workers,
        capacity = config.pool.queue_capacity,
        service_seconds = config.service_seconds,
        shutdown_policy = %config.pool.shutdown_policy,
        restart_policy = %config.pool.restart_policy,
        "Configuration loaded"
    );

    // 3. Shared service time + worker pool
    let setting = Arc::new(
        ServiceTimeSetting::new(config.service_seconds)
            .context("Invalid SLOWPOKE_SERVICE_SECONDS")?,
    );
    let pool = Arc::new(
        WorkerPool::with_defaults(config.pool.clone(), setting.clone())
            .context("Failed to start worker pool")?,
    );

    // 4. Start JSON-RPC control surface
    let (rpc_addr, rpc_handle) = RpcServer::new(config.rpc.clone(), pool.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Background observers
    let mut changes = setting.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let service_seconds = *changes.borrow_and_update();
            info!(service_seconds, "Workers will use new service time from the next item");
        }
    });

    if !config.stats_interval.is_zero() {
        let pool = pool.clone();
        let every = config.stats_interval;
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let stats = pool.stats();
                if stats.shutting_down {
                    break;
                }
                if pool.is_degraded() {
                    warn!(
                        live_workers = stats.live_workers,
                        configured_workers = stats.configured_workers,
                        "Worker pool running below configured concurrency"
                    );
                }
                info!(
                    queue_size = stats.queue_size,
                    capacity = stats.queue_capacity,
                    live_workers = stats.live_workers,
                    completed = stats.completed,
                    failed = stats.failed,
                    rejected = stats.rejected,
                    service_seconds = stats.service_seconds,
                    "Pool stats"
                );
            }
        });
    }

    // 6. Optional load generator
    let (load_tx, load_token) = slowpoke_core::application::shutdown_channel();
    let load_handle = if config.load_rate > 0 {
        let generator = LoadGenerator::new(pool.queue().clone(), config.load_rate)
            .context("Invalid SLOWPOKE_LOAD_RATE")?;
        Some(tokio::spawn(generator.run(load_token)))
    } else {
        None
    };

    info!(rpc = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: producers first, then the pool
    load_tx.shutdown(config.pool.shutdown_policy);
    if let Some(handle) = load_handle {
        let summary = handle.await.context("Load generator task failed")?;
        info!(?summary, "Load generator finished");
    }

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, pool.stop()).await {
        Ok(report) => {
            let report = report.context("Worker pool shutdown failed")?;
            info!(?report, "Worker pool drained");
        }
        Err(_) => warn!(
            grace_period = ?SHUTDOWN_GRACE_PERIOD,
            "Workers did not finish in time; exiting anyway"
        ),
    }

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("SLOWPOKE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("slowpoke=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}
