// Checkpoint Domain Model

use serde::{Deserialize, Serialize};

/// Job key (unique per job type + optional sub-scope, e.g. "wiki_content_fill")
pub type JobKey = String;

/// Opaque, totally-ordered position within a source collection.
///
/// The engine never interprets or compares cursors itself; the `PageSource`
/// owns the ordering and applies the strictly-greater-than bound. This keeps
/// integer rowids, timestamps and composite keys all usable as cursors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Persisted resume position for one job type.
///
/// Invariant: once written, no unprocessed eligible record precedes the
/// cursor under the source's order (resuming with the same eligibility
/// filter leaves no gaps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCheckpoint {
    pub job_key: JobKey,
    pub cursor: Cursor,
    /// Last persistence time (epoch ms)
    pub updated_at: i64,
}

impl JobCheckpoint {
    pub fn new(job_key: impl Into<String>, cursor: Cursor, updated_at: i64) -> Self {
        Self {
            job_key: job_key.into(),
            cursor,
            updated_at,
        }
    }
}
