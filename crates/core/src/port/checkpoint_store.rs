// Checkpoint Store Port (Interface)

use crate::domain::{Cursor, JobCheckpoint};
use crate::error::Result;
use async_trait::async_trait;

/// Durable job_key -> cursor mapping that survives process restarts.
///
/// Save failures are surfaced to the caller but the engine keeps the item
/// counted as processed: at most one batch of rework is the accepted cost
/// of a lost checkpoint write (progress over perfect resumability).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a job, `None` on fresh start
    async fn load(&self, job_key: &str) -> Result<Option<JobCheckpoint>>;

    /// Idempotent upsert; overwrites any prior cursor for the job.
    /// Must be cheap enough to call after every single item.
    async fn save(&self, job_key: &str, cursor: &Cursor) -> Result<()>;

    /// Remove the checkpoint, forcing the next run to start from the beginning
    async fn clear(&self, job_key: &str) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory checkpoint store for tests
    #[derive(Default)]
    pub struct MemoryCheckpointStore {
        inner: Mutex<HashMap<String, JobCheckpoint>>,
        saves: AtomicU64,
        fail_saves: AtomicBool,
    }

    impl MemoryCheckpointStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent `save` fail (checkpoint-write-failure tests)
        pub fn set_fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        pub fn save_count(&self) -> u64 {
            self.saves.load(Ordering::SeqCst)
        }

        pub fn cursor(&self, job_key: &str) -> Option<Cursor> {
            self.inner
                .lock()
                .unwrap()
                .get(job_key)
                .map(|cp| cp.cursor.clone())
        }
    }

    #[async_trait]
    impl CheckpointStore for MemoryCheckpointStore {
        async fn load(&self, job_key: &str) -> Result<Option<JobCheckpoint>> {
            Ok(self.inner.lock().unwrap().get(job_key).cloned())
        }

        async fn save(&self, job_key: &str, cursor: &Cursor) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::Database("checkpoint write refused".to_string()));
            }
            let count = self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.lock().unwrap().insert(
                job_key.to_string(),
                JobCheckpoint::new(job_key, cursor.clone(), count as i64),
            );
            Ok(())
        }

        async fn clear(&self, job_key: &str) -> Result<()> {
            self.inner.lock().unwrap().remove(job_key);
            Ok(())
        }
    }
}
