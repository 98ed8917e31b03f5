//! JSON-RPC Server
//!
//! Serves the control surface over localhost TCP; the admin console (and
//! the `backfill` CLI) are the expected clients, so the server never binds
//! an external interface.

use crate::handler::RpcHandler;
use crate::types::{
    ListRequest, ProgressRequest, ResetCheckpointRequest, StartRequest, StopRequest,
};
use backfill_core::application::JobRegistry;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, registry: Arc<JobRegistry>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(registry)),
        }
    }

    /// Start the JSON-RPC server; returns the handle and the bound address
    /// (port 0 in the config picks a free port)
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to resolve local addr: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("job.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListRequest = params.parse().unwrap_or(ListRequest {});
                    handler.list(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.start.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StartRequest = params.parse()?;
                    handler.start(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.stop.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StopRequest = params.parse()?;
                    handler.stop(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.progress.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ProgressRequest = params.parse()?;
                    handler.progress(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.resetCheckpoint.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ResetCheckpointRequest = params.parse()?;
                    handler.reset_checkpoint(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
