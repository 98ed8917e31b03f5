// Port Layer - Interfaces for external dependencies

pub mod checkpoint_store;
pub mod item_processor;
pub mod page_source;
pub mod time_provider;

// Re-exports
pub use checkpoint_store::CheckpointStore;
pub use item_processor::{EligibilityPredicate, ItemProcessor, ProcessOutcome};
pub use page_source::PageSource;
pub use time_provider::TimeProvider;
