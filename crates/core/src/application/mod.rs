// Application Layer - Engine, cancellation, progress, registry

pub mod engine;
pub mod progress;
pub mod registry;
pub mod stop;

// Re-exports
pub use engine::{BatchEngine, CheckpointMode, EngineConfig, RunOutcome, RunSummary};
pub use progress::ProgressTracker;
pub use registry::{JobDefinition, JobOverview, JobRegistry};
pub use stop::{stop_channel, StopHandle, StopToken};
