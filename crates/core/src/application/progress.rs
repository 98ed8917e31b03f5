// Progress Tracker - thread-safe live counters for one job
//
// One tracker per registered job, owned by the run task and polled by RPC
// callers. Snapshots are eventually consistent: a reader may observe any
// intermediate state, with per-field consistency guarded by the lock.

use crate::domain::{ItemOutcome, JobProgress, RunState};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default capacity of the recent-outcomes ring buffer
pub const RECENT_OUTCOMES_CAPACITY: usize = 10;

struct TrackerState {
    progress: JobProgress,
    recent: VecDeque<ItemOutcome>,
}

/// Read-mostly view of a running job, safe to poll concurrently
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    capacity: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_capacity(RECENT_OUTCOMES_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                progress: JobProgress::idle(),
                recent: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Reset counters and enter Running; clears the outcome buffer
    pub fn begin_run(&self, total: Option<u64>) -> crate::domain::error::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.progress.begin(total)?;
        state.recent.clear();
        Ok(())
    }

    /// Update the work-in-progress label
    pub fn set_current(&self, label: impl Into<String>) {
        self.state.lock().unwrap().progress.current_item = Some(label.into());
    }

    /// Count one processed item and remember its outcome (oldest evicted)
    pub fn record(&self, outcome: ItemOutcome) {
        let mut state = self.state.lock().unwrap();
        state.progress.record(outcome.kind);
        if state.recent.len() == self.capacity {
            state.recent.pop_front();
        }
        state.recent.push_back(outcome);
    }

    /// Enter a terminal state
    pub fn finish(&self, terminal: RunState) -> crate::domain::error::Result<()> {
        self.state.lock().unwrap().progress.finish(terminal)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> JobProgress {
        self.state.lock().unwrap().progress.clone()
    }

    /// Last N item outcomes, oldest first
    pub fn recent(&self) -> Vec<ItemOutcome> {
        self.state.lock().unwrap().recent.iter().cloned().collect()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
