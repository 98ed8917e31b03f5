//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use backfill_core::application::JobOverview;
use backfill_core::domain::{ItemOutcome, JobProgress};
use serde::{Deserialize, Serialize};

/// job.list.v1 - List registered jobs
#[derive(Debug, Deserialize)]
pub struct ListRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub jobs: Vec<JobOverview>,
}

/// job.start.v1 - Start a batch job run
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub job_key: String,
    /// Override the registered missing-only default
    #[serde(default)]
    pub missing_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub job_key: String,
    pub started: bool,
}

/// job.stop.v1 - Request a running job to stop
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub job_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub job_key: String,
    /// False when no run was active
    pub stop_requested: bool,
}

/// job.progress.v1 - Poll live progress
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub job_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    pub job_key: String,
    pub progress: JobProgress,
    /// Last few item outcomes, oldest first
    pub recent: Vec<ItemOutcome>,
}

/// job.resetCheckpoint.v1 - Drop the resume position
#[derive(Debug, Deserialize)]
pub struct ResetCheckpointRequest {
    pub job_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetCheckpointResponse {
    pub job_key: String,
    pub reset: bool,
}
