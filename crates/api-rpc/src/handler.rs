//! RPC Method Handlers
//!
//! Implements the logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::types::{
    SetSettingRequest, SetSettingResponse, SettingResponse, StatsResponse, SubmitRequest,
    SubmitResponse, MAX_SUBMIT_COUNT,
};
use jsonrpsee::types::ErrorObjectOwned;
use slowpoke_core::application::WorkerPool;
use slowpoke_core::domain::{DomainError, WorkItem};
use slowpoke_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    pool: Arc<WorkerPool>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            start_time: Instant::now(),
        }
    }

    /// settings.get.v1
    pub fn get_setting(&self) -> SettingResponse {
        SettingResponse {
            service_seconds: self.pool.setting().get(),
        }
    }

    /// settings.set.v1
    pub fn set_setting(
        &self,
        params: SetSettingRequest,
    ) -> Result<SetSettingResponse, ErrorObjectOwned> {
        let previous = self
            .pool
            .setting()
            .set(params.service_seconds)
            .map_err(|e| to_rpc_error(e.into()))?;

        info!(
            previous,
            service_seconds = params.service_seconds,
            "Service time changed over RPC"
        );
        Ok(SetSettingResponse {
            previous,
            service_seconds: params.service_seconds,
        })
    }

    /// admin.stats.v1
    pub fn stats(&self) -> StatsResponse {
        StatsResponse {
            pool: self.pool.stats(),
            degraded: self.pool.is_degraded(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// work.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        if params.count == 0 || params.count > MAX_SUBMIT_COUNT {
            return Err(to_rpc_error(AppError::Validation(format!(
                "count must be between 1 and {}, got {}",
                MAX_SUBMIT_COUNT, params.count
            ))));
        }

        let queue = self.pool.queue();
        let mut response = SubmitResponse {
            accepted: 0,
            rejected: 0,
        };

        for _ in 0..params.count {
            let item = WorkItem::noop().with_label("rpc");
            let admitted = match params.wait_ms {
                Some(ms) => {
                    queue
                        .enqueue_blocking(item, Duration::from_millis(ms))
                        .await
                }
                None => queue.try_enqueue(item),
            };

            match admitted {
                Ok(_) => response.accepted += 1,
                Err(DomainError::Rejected { .. }) | Err(DomainError::EnqueueTimeout { .. }) => {
                    response.rejected += 1
                }
                Err(e) => return Err(to_rpc_error(e.into())),
            }
        }

        Ok(response)
    }
}
