// Batch Engine - drives one job run to completion or cancellation

pub mod constants;

use constants::*;

use crate::application::progress::ProgressTracker;
use crate::application::stop::StopToken;
use crate::domain::{BatchItem, Cursor, ItemOutcome, JobKey, OutcomeKind, RunState};
use crate::port::{
    CheckpointStore, EligibilityPredicate, ItemProcessor, PageSource, ProcessOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// When the resume cursor is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    /// After every processed item (default, strongest resumability)
    PerItem,
    /// Once per fetched page (documented relaxation for cheap item work)
    PerPage,
}

/// Per-run engine configuration
#[derive(Clone)]
pub struct EngineConfig {
    pub page_size: u32,
    /// Throttle between items, to respect external service rate limits
    pub item_delay: Duration,
    pub process_timeout: Duration,
    pub fetch_timeout: Duration,
    pub checkpoint_mode: CheckpointMode,
    /// Process only items passing the eligibility predicate
    pub missing_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            item_delay: DEFAULT_ITEM_DELAY,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            checkpoint_mode: CheckpointMode::PerItem,
            missing_only: false,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Source exhausted; checkpoint cleared
    Completed,
    /// Operator requested stop; checkpoint preserved
    Stopped,
    /// Page fetch or checkpoint load failed; checkpoint preserved
    Errored(String),
}

/// Final counters for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub processed: u64,
    pub updated: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Drives fetch -> filter -> process -> checkpoint cycles for one job.
///
/// Items are processed strictly one at a time: external services are rate
/// limited, and a single logical worker per job keeps checkpoint semantics
/// simple (no locking across concurrent workers on the same job key).
/// Cross-process exclusion per job key remains the caller's obligation.
pub struct BatchEngine {
    job_key: JobKey,
    checkpoints: Arc<dyn CheckpointStore>,
    source: Arc<dyn PageSource>,
    processor: Arc<dyn ItemProcessor>,
    eligibility: Option<EligibilityPredicate>,
    config: EngineConfig,
}

impl BatchEngine {
    pub fn new(
        job_key: impl Into<String>,
        checkpoints: Arc<dyn CheckpointStore>,
        source: Arc<dyn PageSource>,
        processor: Arc<dyn ItemProcessor>,
        eligibility: Option<EligibilityPredicate>,
        config: EngineConfig,
    ) -> Self {
        Self {
            job_key: job_key.into(),
            checkpoints,
            source,
            processor,
            eligibility,
            config,
        }
    }

    /// Run the job until the source is exhausted, a stop is requested, or
    /// a page-level error occurs. Item-level failures are counted and the
    /// loop keeps moving.
    pub async fn run(&self, progress: &ProgressTracker, stop: &mut StopToken) -> RunSummary {
        let total = self.probe_total().await;

        if let Err(e) = progress.begin_run(total) {
            return RunSummary {
                outcome: RunOutcome::Errored(e.to_string()),
                processed: 0,
                updated: 0,
                failed: 0,
                skipped: 0,
            };
        }

        info!(
            job_key = %self.job_key,
            page_size = self.config.page_size,
            missing_only = self.config.missing_only,
            total = ?total,
            "Batch run started"
        );

        let mut cursor: Option<Cursor> = match self.checkpoints.load(&self.job_key).await {
            Ok(cp) => {
                if let Some(cp) = &cp {
                    info!(job_key = %self.job_key, cursor = %cp.cursor, "Resuming from checkpoint");
                }
                cp.map(|cp| cp.cursor)
            }
            Err(e) => {
                return self.finish(
                    progress,
                    RunOutcome::Errored(format!("checkpoint load failed: {e}")),
                )
            }
        };
        let mut last_saved = cursor.clone();
        // order_key of the last fully-processed item in this run
        let mut last_done: Option<Cursor> = None;
        // whether a successful save already sits at or past last_done;
        // cursors are opaque here, so ordering is tracked by sequencing
        let mut done_covered = true;

        loop {
            if stop.is_stop_requested() {
                return self
                    .stop_run(progress, &last_done, &mut last_saved, done_covered)
                    .await;
            }

            let page = match timeout(
                self.config.fetch_timeout,
                self.source.fetch_page(cursor.as_ref(), self.config.page_size),
            )
            .await
            {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    return self.finish(
                        progress,
                        RunOutcome::Errored(format!("page fetch failed: {e}")),
                    )
                }
                Err(_) => {
                    return self.finish(
                        progress,
                        RunOutcome::Errored("page fetch timed out".to_string()),
                    )
                }
            };

            if page.is_empty() {
                // Full pass complete: the next run starts from the beginning
                if let Err(e) = self.checkpoints.clear(&self.job_key).await {
                    warn!(job_key = %self.job_key, error = %e, "Failed to clear checkpoint after full pass");
                }
                return self.finish(progress, RunOutcome::Completed);
            }

            let page_end = page
                .last()
                .map(|item| item.order_key.clone())
                .unwrap_or_else(|| Cursor::new(""));

            let items: Vec<BatchItem> = match (&self.eligibility, self.config.missing_only) {
                (Some(pred), true) => page.into_iter().filter(|item| pred(item)).collect(),
                _ => page,
            };

            if items.is_empty() {
                debug!(
                    job_key = %self.job_key,
                    page_end = %page_end,
                    "Page fully filtered, advancing cursor"
                );
            }

            for item in &items {
                // Checked before each item, never mid-flight
                if stop.is_stop_requested() {
                    return self
                        .stop_run(progress, &last_done, &mut last_saved, done_covered)
                        .await;
                }

                progress.set_current(item.label());
                let (kind, detail) = self.process_one(item).await;
                progress.record(ItemOutcome {
                    item_id: item.id.clone(),
                    label: item.label(),
                    kind,
                    detail,
                });
                last_done = Some(item.order_key.clone());
                done_covered = false;

                if self.config.checkpoint_mode == CheckpointMode::PerItem {
                    self.save_checkpoint(&item.order_key, &mut last_saved).await;
                    done_covered = last_saved.as_ref() == Some(&item.order_key);
                }

                // Inter-item throttle, cut short by a stop request
                if !self.config.item_delay.is_zero() {
                    tokio::select! {
                        _ = sleep(self.config.item_delay) => {}
                        _ = stop.wait() => {}
                    }
                }
            }

            // Advance past the fetched page even when everything was
            // filtered out, otherwise an all-ineligible page would be
            // re-fetched forever.
            self.save_checkpoint(&page_end, &mut last_saved).await;
            if last_saved.as_ref() == Some(&page_end) {
                // page_end is at or past every item in the page
                done_covered = true;
            }
            cursor = Some(page_end);
        }
    }

    /// Classify one processing call into a counter bucket. Errors and
    /// timeouts become Failed; they never abort the batch.
    async fn process_one(&self, item: &BatchItem) -> (OutcomeKind, Option<String>) {
        match timeout(self.config.process_timeout, self.processor.process(item)).await {
            Ok(Ok(ProcessOutcome::Updated)) => (OutcomeKind::Updated, None),
            Ok(Ok(ProcessOutcome::Skipped(reason))) => {
                debug!(job_key = %self.job_key, item_id = %item.id, reason = %reason, "Item skipped");
                (OutcomeKind::Skipped, Some(reason))
            }
            Ok(Err(e)) => {
                warn!(job_key = %self.job_key, item_id = %item.id, error = %e, "Item processing failed");
                (OutcomeKind::Failed, Some(e.to_string()))
            }
            Err(_) => {
                warn!(job_key = %self.job_key, item_id = %item.id, "Item processing timed out");
                (OutcomeKind::Failed, Some("processing timed out".to_string()))
            }
        }
    }

    /// Persist the cursor; a write failure is logged and the run keeps
    /// moving (at most one batch of rework on resume).
    async fn save_checkpoint(&self, cursor: &Cursor, last_saved: &mut Option<Cursor>) {
        if last_saved.as_ref() == Some(cursor) {
            return;
        }
        match self.checkpoints.save(&self.job_key, cursor).await {
            Ok(()) => *last_saved = Some(cursor.clone()),
            Err(e) => {
                error!(
                    job_key = %self.job_key,
                    cursor = %cursor,
                    error = %e,
                    "Checkpoint write failed, continuing without it"
                );
            }
        }
    }

    async fn stop_run(
        &self,
        progress: &ProgressTracker,
        last_done: &Option<Cursor>,
        last_saved: &mut Option<Cursor>,
        done_covered: bool,
    ) -> RunSummary {
        // Persist the position of the last fully-processed item so the
        // next run resumes right after it. Skipped when a later save (the
        // page-end advance past a filtered tail) already covers it: that
        // write would move the checkpoint backward.
        if !done_covered {
            if let Some(cursor) = last_done {
                self.save_checkpoint(cursor, last_saved).await;
            }
        }
        self.finish(progress, RunOutcome::Stopped)
    }

    fn finish(&self, progress: &ProgressTracker, outcome: RunOutcome) -> RunSummary {
        let terminal = match &outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Stopped => RunState::Stopped,
            RunOutcome::Errored(_) => RunState::Errored,
        };
        if let Err(e) = progress.finish(terminal) {
            warn!(job_key = %self.job_key, error = %e, "Progress state transition rejected");
        }
        let snapshot = progress.snapshot();
        let summary = RunSummary {
            outcome,
            processed: snapshot.processed,
            updated: snapshot.updated,
            failed: snapshot.failed,
            skipped: snapshot.skipped,
        };
        match &summary.outcome {
            RunOutcome::Completed => info!(
                job_key = %self.job_key,
                processed = summary.processed,
                updated = summary.updated,
                failed = summary.failed,
                skipped = summary.skipped,
                "Batch run completed"
            ),
            RunOutcome::Stopped => info!(
                job_key = %self.job_key,
                processed = summary.processed,
                "Batch run stopped by operator"
            ),
            RunOutcome::Errored(reason) => error!(
                job_key = %self.job_key,
                processed = summary.processed,
                reason = %reason,
                "Batch run errored"
            ),
        }
        summary
    }

    /// Best-effort total for progress display. With `missing_only` the
    /// eligible count is unknown up front, so the total stays unknown.
    async fn probe_total(&self) -> Option<u64> {
        if self.config.missing_only {
            return None;
        }
        match timeout(self.config.fetch_timeout, self.source.count()).await {
            Ok(Ok(total)) => total,
            Ok(Err(e)) => {
                warn!(job_key = %self.job_key, error = %e, "Source count failed, total unknown");
                None
            }
            Err(_) => {
                warn!(job_key = %self.job_key, "Source count timed out, total unknown");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stop::stop_channel;
    use crate::port::checkpoint_store::mocks::MemoryCheckpointStore;
    use crate::port::item_processor::mocks::ScriptedProcessor;
    use crate::port::page_source::mocks::VecPageSource;
    use serde_json::json;

    fn items(count: u32) -> Vec<BatchItem> {
        (1..=count)
            .map(|i| {
                BatchItem::new(
                    format!("item-{i:03}"),
                    Cursor::new(format!("{i:03}")),
                    json!({ "title": format!("Entry {i}"), "content": "" }),
                )
            })
            .collect()
    }

    fn fast_config(page_size: u32) -> EngineConfig {
        EngineConfig {
            page_size,
            item_delay: Duration::ZERO,
            ..EngineConfig::default()
        }
    }

    fn engine(
        checkpoints: Arc<MemoryCheckpointStore>,
        source: Arc<VecPageSource>,
        processor: Arc<dyn ItemProcessor>,
        eligibility: Option<EligibilityPredicate>,
        config: EngineConfig,
    ) -> BatchEngine {
        BatchEngine::new("wiki_content_fill", checkpoints, source, processor, eligibility, config)
    }

    #[tokio::test]
    async fn full_pass_completes_and_clears_checkpoint() {
        // 25 items, page size 10: pages of 10/10/5 then the empty page
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(25)));
        let processor = Arc::new(ScriptedProcessor::new());
        let eng = engine(
            checkpoints.clone(),
            source.clone(),
            processor.clone(),
            None,
            fast_config(10),
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.processed, 25);
        assert_eq!(summary.updated, 25);
        assert_eq!(source.fetch_count(), 4);
        assert!(checkpoints.cursor("wiki_content_fill").is_none());
        assert_eq!(tracker.snapshot().state, RunState::Completed);
        assert_eq!(tracker.snapshot().total, Some(25));
    }

    #[tokio::test]
    async fn item_failures_are_counted_not_fatal() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(10)));
        let processor =
            Arc::new(ScriptedProcessor::new().failing_on(["item-003", "item-007"]));
        let eng = engine(
            checkpoints.clone(),
            source,
            processor,
            None,
            fast_config(10),
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.updated, 8);
        assert_eq!(summary.processed, 10);
        assert!(checkpoints.cursor("wiki_content_fill").is_none());
    }

    /// Processor that requests a stop from within its Nth call, so the
    /// cancellation point is deterministic.
    struct StopAfter {
        handle: std::sync::Mutex<Option<crate::application::stop::StopHandle>>,
        after: u64,
        calls: std::sync::atomic::AtomicU64,
    }

    #[async_trait::async_trait]
    impl ItemProcessor for StopAfter {
        async fn process(&self, _item: &BatchItem) -> crate::error::Result<ProcessOutcome> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            if call == self.after {
                if let Some(handle) = self.handle.lock().unwrap().take() {
                    handle.request_stop();
                }
            }
            Ok(ProcessOutcome::Updated)
        }
    }

    #[tokio::test]
    async fn stop_preserves_checkpoint_at_last_processed_item() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(25)));
        let (handle, mut stop) = stop_channel();
        // Stop is requested while item 12 is in flight; the engine notices
        // it at the next item boundary.
        let processor = Arc::new(StopAfter {
            handle: std::sync::Mutex::new(Some(handle)),
            after: 12,
            calls: std::sync::atomic::AtomicU64::new(0),
        });
        let eng = engine(
            checkpoints.clone(),
            source,
            processor,
            None,
            fast_config(10),
        );

        let tracker = ProgressTracker::new();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.processed, 12);
        assert_eq!(
            checkpoints.cursor("wiki_content_fill"),
            Some(Cursor::new("012"))
        );
        assert_eq!(tracker.snapshot().state, RunState::Stopped);
    }

    #[tokio::test]
    async fn stop_after_filtered_tail_keeps_the_page_end_checkpoint() {
        // One page of 10 where the tail (items 6..10) is already filled:
        // the stop lands after the page-end save has advanced past the
        // ineligible tail, and must not rewind to the last processed item.
        let mut all = items(10);
        for item in &mut all[5..] {
            item.payload["content"] = json!("already filled");
        }

        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(all));
        let (handle, mut stop) = stop_channel();
        let processor = Arc::new(StopAfter {
            handle: std::sync::Mutex::new(Some(handle)),
            after: 5,
            calls: std::sync::atomic::AtomicU64::new(0),
        });
        let needs_content: EligibilityPredicate = Arc::new(|item: &BatchItem| {
            item.payload
                .get("content")
                .and_then(|v| v.as_str())
                .map(str::is_empty)
                .unwrap_or(true)
        });

        let config = EngineConfig {
            missing_only: true,
            ..fast_config(10)
        };
        let eng = engine(
            checkpoints.clone(),
            source,
            processor,
            Some(needs_content),
            config,
        );

        let tracker = ProgressTracker::new();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.processed, 5);
        assert_eq!(
            checkpoints.cursor("wiki_content_fill"),
            Some(Cursor::new("010"))
        );
    }

    #[tokio::test]
    async fn resume_processes_only_the_remainder() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        // Simulate an interrupted run that got through item 12
        checkpoints
            .save("wiki_content_fill", &Cursor::new("012"))
            .await
            .unwrap();

        let source = Arc::new(VecPageSource::new(items(25)));
        let processor = Arc::new(ScriptedProcessor::new());
        let eng = engine(
            checkpoints.clone(),
            source,
            processor.clone(),
            None,
            fast_config(10),
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.processed, 13);
        let ids = processor.processed_ids();
        assert_eq!(ids.first().map(String::as_str), Some("item-013"));
        assert_eq!(ids.last().map(String::as_str), Some("item-025"));
        assert!(checkpoints.cursor("wiki_content_fill").is_none());
    }

    #[tokio::test]
    async fn fully_filtered_pages_advance_without_livelock() {
        // First page (10) has filled content, second page has 4 empty ones
        let mut all = items(10);
        for item in &mut all {
            item.payload["content"] = json!("already filled");
        }
        all.extend(items(14).split_off(10));

        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(all));
        let processor = Arc::new(ScriptedProcessor::new());
        let needs_content: EligibilityPredicate = Arc::new(|item: &BatchItem| {
            item.payload
                .get("content")
                .and_then(|v| v.as_str())
                .map(str::is_empty)
                .unwrap_or(true)
        });

        let config = EngineConfig {
            missing_only: true,
            ..fast_config(10)
        };
        let eng = engine(
            checkpoints.clone(),
            source.clone(),
            processor.clone(),
            Some(needs_content),
            config,
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.processed, 4);
        // page 1 (all filtered) + page 2 + empty page: cursor advanced, no refetch loop
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(
            processor.processed_ids(),
            vec!["item-011", "item-012", "item-013", "item-014"]
        );
    }

    #[tokio::test]
    async fn fetch_failure_ends_errored_and_keeps_checkpoint() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(25)).failing_after(1));
        let processor = Arc::new(ScriptedProcessor::new());
        let eng = engine(
            checkpoints.clone(),
            source,
            processor,
            None,
            fast_config(10),
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert!(matches!(summary.outcome, RunOutcome::Errored(_)));
        assert_eq!(summary.processed, 10);
        // last per-item checkpoint survives for the retry
        assert_eq!(
            checkpoints.cursor("wiki_content_fill"),
            Some(Cursor::new("010"))
        );
        assert_eq!(tracker.snapshot().state, RunState::Errored);
    }

    #[tokio::test]
    async fn checkpoint_write_failure_does_not_abort_the_batch() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        checkpoints.set_fail_saves(true);
        let source = Arc::new(VecPageSource::new(items(5)));
        let processor = Arc::new(ScriptedProcessor::new());
        let eng = engine(
            checkpoints.clone(),
            source,
            processor,
            None,
            fast_config(5),
        );

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.processed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_processing_counts_as_failed() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(2)));
        let processor =
            Arc::new(ScriptedProcessor::new().with_delay(Duration::from_secs(120)));
        let config = EngineConfig {
            process_timeout: Duration::from_secs(1),
            ..fast_config(10)
        };
        let eng = engine(checkpoints, source, processor, None, config);

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn per_page_mode_checkpoints_once_per_page() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(20)));
        let processor = Arc::new(ScriptedProcessor::new());
        let config = EngineConfig {
            checkpoint_mode: CheckpointMode::PerPage,
            ..fast_config(10)
        };
        let eng = engine(checkpoints.clone(), source, processor, None, config);

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        // one save per full page, then the final clear
        assert_eq!(checkpoints.save_count(), 2);
        assert!(checkpoints.cursor("wiki_content_fill").is_none());
    }

    #[tokio::test]
    async fn counters_stay_consistent_under_mixed_outcomes() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let source = Arc::new(VecPageSource::new(items(12)));
        let processor = Arc::new(
            ScriptedProcessor::new()
                .failing_on(["item-002"])
                .skipping(["item-005", "item-009"]),
        );
        let eng = engine(checkpoints, source, processor, None, fast_config(4));

        let tracker = ProgressTracker::new();
        let (_handle, mut stop) = stop_channel();
        let summary = eng.run(&tracker, &mut stop).await;

        assert_eq!(summary.processed, summary.updated + summary.failed + summary.skipped);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.updated, 9);
    }
}
