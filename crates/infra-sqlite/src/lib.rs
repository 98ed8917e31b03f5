// Backfill Infrastructure - SQLite Adapters
// Implements: CheckpointStore, PageSource over a local table

mod checkpoint_store;
mod connection;
mod migration;
mod record_source;

pub use checkpoint_store::SqliteCheckpointStore;
pub use connection::create_pool;
pub use migration::run_migrations;
pub use record_source::{SourceQuery, SqliteRecordSource};

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
