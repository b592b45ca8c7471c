use chrono::{DateTime, Utc};

use crate::PageRef;

/// Identifies exactly one backend job. Never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub search_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(search_id: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            search_id: search_id.into(),
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    InProgress {
        discovered: u64,
    },
    Completed {
        /// Starts with the start page and ends with the finish page.
        path: Vec<PageRef>,
        discovered: u64,
        elapsed_seconds: f64,
        /// Empty when the backend did not report one.
        method: String,
    },
    /// Search space exhausted without reaching the finish page.
    NotFound {
        discovered: u64,
        elapsed_seconds: f64,
    },
    Aborted,
    Failed {
        reason: String,
    },
}

impl JobStatus {
    /// Terminal states never change again for the same handle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress { .. })
    }

    pub fn discovered(&self) -> Option<u64> {
        match self {
            JobStatus::InProgress { discovered }
            | JobStatus::Completed { discovered, .. }
            | JobStatus::NotFound { discovered, .. } => Some(*discovered),
            JobStatus::Aborted | JobStatus::Failed { .. } => None,
        }
    }
}

/// Successful outcomes of a cancel request; both are idempotent successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    Acknowledged,
    AlreadyFinished,
}

/// One progress line from the log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    /// Monotonic within one stream connection only.
    pub sequence: u64,
}

impl LogLine {
    pub fn new(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            text: text.into(),
            sequence,
        }
    }
}
