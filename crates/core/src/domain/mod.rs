// Domain Layer - Pure business logic and entities

pub mod checkpoint;
pub mod error;
pub mod item;
pub mod options;
pub mod progress;

// Re-exports
pub use checkpoint::{Cursor, JobCheckpoint, JobKey};
pub use error::DomainError;
pub use item::BatchItem;
pub use options::normalize_options;
pub use progress::{ItemOutcome, JobProgress, OutcomeKind, RunState};
