// Item Processor Port (Interface)

use crate::domain::BatchItem;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Successful processing outcome for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The external record was (re)written
    Updated,
    /// Nothing to do for this item
    Skipped(String),
}

/// Caller-supplied per-item operation (e.g. call a content-generation
/// endpoint and write back the result).
///
/// Contract: the external mutation must be idempotent or safely
/// re-appliable, since a checkpoint write failure can cause an item to be
/// reprocessed on resume. An `Err` is recorded as a Failed counter and the
/// batch keeps moving; it never aborts the run.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &BatchItem) -> Result<ProcessOutcome>;
}

/// Pure, side-effect-free filter deciding whether an item still needs
/// processing ("missing only" mode). Must be deterministic so re-running
/// without the filter is safe.
pub type EligibilityPredicate = Arc<dyn Fn(&BatchItem) -> bool + Send + Sync>;

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted processor for tests: fails or skips configured item IDs,
    /// records the order of processed IDs.
    #[derive(Default)]
    pub struct ScriptedProcessor {
        fail_ids: HashSet<String>,
        skip_ids: HashSet<String>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProcessor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
            self.fail_ids = ids.into_iter().map(Into::into).collect();
            self
        }

        pub fn skipping(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
            self.skip_ids = ids.into_iter().map(Into::into).collect();
            self
        }

        /// Simulate slow external calls (process-timeout tests)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn processed_ids(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ItemProcessor for ScriptedProcessor {
        async fn process(&self, item: &BatchItem) -> Result<ProcessOutcome> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push(item.id.clone());
            if self.fail_ids.contains(&item.id) {
                return Err(AppError::Remote(format!("processing refused: {}", item.id)));
            }
            if self.skip_ids.contains(&item.id) {
                return Ok(ProcessOutcome::Skipped("already filled".to_string()));
            }
            Ok(ProcessOutcome::Updated)
        }
    }
}
