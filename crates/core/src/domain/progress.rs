// Job Progress Domain Model

use serde::{Deserialize, Serialize};

/// Run state machine: Idle -> Running -> {Completed | Stopped | Errored}
///
/// `Stopped` and `Errored` preserve the checkpoint; `Completed` clears it.
/// From any terminal state a new start transitions back through Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
    Errored,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped | RunState::Errored)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Running => write!(f, "RUNNING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Stopped => write!(f, "STOPPED"),
            RunState::Errored => write!(f, "ERRORED"),
        }
    }
}

/// Outcome classification for a single processed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Updated,
    Skipped,
    Failed,
}

/// One entry in the bounded recent-outcomes buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub label: String,
    pub kind: OutcomeKind,
    /// Skip reason or failure message
    pub detail: Option<String>,
}

/// Live counters for one job run (ephemeral, in-memory).
///
/// Invariant: `processed == updated + failed + skipped`, and
/// `processed <= total` once `total` is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub state: RunState,
    /// Pre-computed item count; `None` for streaming jobs
    pub total: Option<u64>,
    pub processed: u64,
    pub updated: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Human-readable description of the item being worked on
    pub current_item: Option<String>,
}

impl JobProgress {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            total: None,
            processed: 0,
            updated: 0,
            failed: 0,
            skipped: 0,
            current_item: None,
        }
    }

    /// Transition to Running, resetting all counters for a fresh run
    pub fn begin(&mut self, total: Option<u64>) -> crate::domain::error::Result<()> {
        if self.state.is_running() {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: RunState::Running.to_string(),
            });
        }
        *self = Self::idle();
        self.state = RunState::Running;
        self.total = total;
        Ok(())
    }

    /// Transition to a terminal state
    pub fn finish(&mut self, terminal: RunState) -> crate::domain::error::Result<()> {
        if !self.state.is_running() || !terminal.is_terminal() {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: terminal.to_string(),
            });
        }
        self.state = terminal;
        self.current_item = None;
        Ok(())
    }

    /// Count one processed item
    pub fn record(&mut self, kind: OutcomeKind) {
        self.processed += 1;
        match kind {
            OutcomeKind::Updated => self.updated += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::idle()
    }
}
