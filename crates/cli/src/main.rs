//! SlowPoke CLI - operator control surface for a running daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";

#[derive(Parser)]
#[command(name = "slowpoke-ctl")]
#[command(about = "Inspect and tune a running SlowPoke daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "SLOWPOKE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current service time
    Get,

    /// Change the service time (simulated seconds per item)
    Set {
        /// New value, must be >= 0
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },

    /// Show queue and worker status
    Status,

    /// Submit simulated work items
    Submit {
        /// Number of items
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Wait up to this many milliseconds per item instead of failing fast
        #[arg(long)]
        wait_ms: Option<u64>,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct SettingResult {
    service_seconds: i64,
}

#[derive(Deserialize)]
struct SetSettingResult {
    previous: i64,
    service_seconds: i64,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    accepted: usize,
    rejected: usize,
}

#[derive(Deserialize)]
struct StatsResult {
    queue_size: usize,
    queue_capacity: usize,
    configured_workers: usize,
    live_workers: usize,
    accepted: u64,
    rejected: u64,
    timed_out: u64,
    completed: u64,
    failed: u64,
    worker_deaths: u64,
    service_seconds: i64,
    shutting_down: bool,
    degraded: bool,
    uptime_seconds: u64,
}

#[derive(Tabled)]
struct StatRow {
    metric: &'static str,
    value: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get => {
            let result = call_rpc(&cli.rpc_url, "settings.get.v1", json!({})).await?;
            let setting: SettingResult = serde_json::from_value(result)?;
            println!("service time: {}s", setting.service_seconds.to_string().bold());
        }
        Commands::Set { seconds } => {
            let result = call_rpc(
                &cli.rpc_url,
                "settings.set.v1",
                json!({ "service_seconds": seconds }),
            )
            .await?;
            let changed: SetSettingResult = serde_json::from_value(result)?;
            println!(
                "{} service time {}s -> {}s",
                "✓".green(),
                changed.previous,
                changed.service_seconds.to_string().bold()
            );
        }
        Commands::Status => {
            let result = call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await?;
            let stats: StatsResult = serde_json::from_value(result)?;
            print_status(&stats);
        }
        Commands::Submit { count, wait_ms } => {
            let result = call_rpc(
                &cli.rpc_url,
                "work.submit.v1",
                json!({ "count": count, "wait_ms": wait_ms }),
            )
            .await?;
            let submitted: SubmitResult = serde_json::from_value(result)?;
            if submitted.rejected > 0 {
                println!("{} queue pushed back", "!".yellow());
            }
            println!("{}", Table::new(vec![submitted]));
        }
    }

    Ok(())
}

fn print_status(stats: &StatsResult) {
    let health = if stats.shutting_down {
        "shutting down".yellow()
    } else if stats.degraded {
        "degraded".red()
    } else {
        "healthy".green()
    };
    println!("pool: {}", health);

    let rows = vec![
        StatRow {
            metric: "queue",
            value: format!("{}/{}", stats.queue_size, stats.queue_capacity),
        },
        StatRow {
            metric: "workers",
            value: format!("{}/{}", stats.live_workers, stats.configured_workers),
        },
        StatRow {
            metric: "service time",
            value: format!("{}s", stats.service_seconds),
        },
        StatRow {
            metric: "accepted",
            value: stats.accepted.to_string(),
        },
        StatRow {
            metric: "rejected",
            value: stats.rejected.to_string(),
        },
        StatRow {
            metric: "timed out",
            value: stats.timed_out.to_string(),
        },
        StatRow {
            metric: "completed",
            value: stats.completed.to_string(),
        },
        StatRow {
            metric: "failed",
            value: stats.failed.to_string(),
        },
        StatRow {
            metric: "worker deaths",
            value: stats.worker_deaths.to_string(),
        },
        StatRow {
            metric: "uptime",
            value: format!("{}s", stats.uptime_seconds),
        },
    ];
    println!("{}", Table::new(rows));
}
