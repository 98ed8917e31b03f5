//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 control surface for the Backfill engine:
//! list, start, stop, progress and checkpoint reset.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

mod rate_limiter;

pub use server::{RpcServer, RpcServerConfig};
