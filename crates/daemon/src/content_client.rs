//! Content Service Processor
//!
//! Per-item processor that delegates the actual mutation to the platform's
//! content service over JSON-RPC (e.g. "generate wiki content for this
//! entry and write it back"). One processor instance per job, bound to the
//! service method for that job type.

use async_trait::async_trait;
use backfill_core::domain::BatchItem;
use backfill_core::error::{AppError, Result};
use backfill_core::port::{ItemProcessor, ProcessOutcome};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::time::Duration;
use tracing::debug;

/// Request timeout for one content-service call.
///
/// The engine applies its own per-item timeout on top; this one just keeps
/// a wedged connection from holding the HTTP client forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ContentServiceProcessor {
    client: HttpClient,
    method: String,
}

impl ContentServiceProcessor {
    /// `url` is the content-service RPC endpoint, `method` the per-job
    /// method name (e.g. `content.fillWikiEntry.v1`)
    pub fn new(url: &str, method: impl Into<String>) -> Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .map_err(|e| AppError::Config(format!("Content service client: {e}")))?;
        Ok(Self {
            client,
            method: method.into(),
        })
    }
}

#[async_trait]
impl ItemProcessor for ContentServiceProcessor {
    async fn process(&self, item: &BatchItem) -> Result<ProcessOutcome> {
        let response: serde_json::Value = self
            .client
            .request(&self.method, rpc_params![item.id.clone(), item.payload.clone()])
            .await
            .map_err(|e| AppError::Remote(format!("{}: {e}", self.method)))?;

        debug!(method = %self.method, item_id = %item.id, response = %response, "Content service call done");

        match response.get("status").and_then(|v| v.as_str()) {
            Some("updated") => Ok(ProcessOutcome::Updated),
            Some("skipped") => {
                let reason = response
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("no reason given")
                    .to_string();
                Ok(ProcessOutcome::Skipped(reason))
            }
            other => Err(AppError::Remote(format!(
                "{}: unexpected status {:?}",
                self.method, other
            ))),
        }
    }
}
