//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    ListRequest, ListResponse, ProgressRequest, ProgressResponse, ResetCheckpointRequest,
    ResetCheckpointResponse, StartRequest, StartResponse, StopRequest, StopResponse,
};
use backfill_core::application::JobRegistry;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    registry: Arc<JobRegistry>,
    rate_limiter: RateLimiter,
}

impl RpcHandler {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("BACKFILL_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("BACKFILL_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            registry,
            rate_limiter: RateLimiter::new(max_burst, rate_per_sec),
        }
    }

    async fn admit(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.check().await {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// job.list.v1
    pub async fn list(&self, _params: ListRequest) -> Result<ListResponse, ErrorObjectOwned> {
        self.admit().await?;
        let jobs = self.registry.jobs().await.map_err(to_rpc_error)?;
        Ok(ListResponse { jobs })
    }

    /// job.start.v1
    pub async fn start(&self, params: StartRequest) -> Result<StartResponse, ErrorObjectOwned> {
        self.admit().await?;
        self.registry
            .start(&params.job_key, params.missing_only)
            .map_err(to_rpc_error)?;
        Ok(StartResponse {
            job_key: params.job_key,
            started: true,
        })
    }

    /// job.stop.v1
    pub async fn stop(&self, params: StopRequest) -> Result<StopResponse, ErrorObjectOwned> {
        self.admit().await?;
        let stop_requested = self
            .registry
            .request_stop(&params.job_key)
            .map_err(to_rpc_error)?;
        Ok(StopResponse {
            job_key: params.job_key,
            stop_requested,
        })
    }

    /// job.progress.v1
    pub async fn progress(
        &self,
        params: ProgressRequest,
    ) -> Result<ProgressResponse, ErrorObjectOwned> {
        self.admit().await?;
        let (progress, recent) = self
            .registry
            .progress(&params.job_key)
            .map_err(to_rpc_error)?;
        Ok(ProgressResponse {
            job_key: params.job_key,
            progress,
            recent,
        })
    }

    /// job.resetCheckpoint.v1
    pub async fn reset_checkpoint(
        &self,
        params: ResetCheckpointRequest,
    ) -> Result<ResetCheckpointResponse, ErrorObjectOwned> {
        self.admit().await?;
        self.registry
            .reset_checkpoint(&params.job_key)
            .await
            .map_err(to_rpc_error)?;
        Ok(ResetCheckpointResponse {
            job_key: params.job_key,
            reset: true,
        })
    }
}
