use std::collections::VecDeque;

use crate::{DisplayModel, JobHandle, JobStatus, LogLine, SearchParameters};

pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Where the session is in the lifecycle of its current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Waiting for the backend to accept the search.
    Submitting,
    Polling,
    /// A cancel request is in flight; a queued start waits for it.
    Cancelling,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogStreamStatus {
    #[default]
    Disconnected,
    Connected,
    Lost(String),
}

/// Everything the presentation layer may know about the current search.
///
/// Only [`crate::update`] mutates it; observers get clones.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    phase: Phase,
    generation: u64,
    params: Option<SearchParameters>,
    handle: Option<JobHandle>,
    status: Option<JobStatus>,
    logs: VecDeque<LogLine>,
    log_capacity: usize,
    log_stream: LogStreamStatus,
    cancel_requested: bool,
    cancel_in_flight: bool,
    abandoned: Option<String>,
    pending_start: Option<SearchParameters>,
    poll_failures: u32,
    revision: u64,
    dirty: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            params: None,
            handle: None,
            status: None,
            logs: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            log_stream: LogStreamStatus::Disconnected,
            cancel_requested: false,
            cancel_in_flight: false,
            abandoned: None,
            pending_start: None,
            poll_failures: 0,
            revision: 0,
            dirty: false,
        }
    }

    pub fn view(&self) -> DisplayModel {
        crate::present(self)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn params(&self) -> Option<&SearchParameters> {
        self.params.as_ref()
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn status(&self) -> Option<&JobStatus> {
        self.status.as_ref()
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogLine> {
        self.logs.iter()
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn log_stream(&self) -> &LogStreamStatus {
        &self.log_stream
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Reason the cancel could not be confirmed, if the user gave up on the job.
    pub fn abandoned(&self) -> Option<&str> {
        self.abandoned.as_deref()
    }

    pub fn pending_start(&self) -> Option<&SearchParameters> {
        self.pending_start.as_ref()
    }

    /// Consecutive polls that failed at the transport level.
    pub fn poll_failures(&self) -> u32 {
        self.poll_failures
    }

    /// Number of published mutations.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True while a job exists that has not reached a settled state.
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            Phase::Submitting | Phase::Polling | Phase::Cancelling
        )
    }

    /// Clears the dirty flag, returning whether it was set.
    ///
    /// Each consumed mutation advances [`SessionState::revision`].
    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = std::mem::take(&mut self.dirty);
        if was_dirty {
            self.revision += 1;
        }
        was_dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replaces the per-search fields for a fresh submission.
    ///
    /// The log channel outlives jobs, so its status survives; buffered lines do not.
    pub(crate) fn begin_search(&mut self, params: SearchParameters) -> u64 {
        self.generation += 1;
        self.phase = Phase::Submitting;
        self.params = Some(params);
        self.handle = None;
        self.status = None;
        self.logs.clear();
        self.cancel_requested = false;
        self.cancel_in_flight = false;
        self.abandoned = None;
        self.pending_start = None;
        self.poll_failures = 0;
        self.mark_dirty();
        self.generation
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_handle(&mut self, handle: JobHandle) {
        self.handle = Some(handle);
        self.mark_dirty();
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        if self.status.as_ref() != Some(&status) {
            self.status = Some(status);
            self.mark_dirty();
        }
    }

    pub(crate) fn has_terminal_status(&self) -> bool {
        self.status.as_ref().is_some_and(JobStatus::is_terminal)
    }

    pub(crate) fn request_cancel(&mut self) {
        self.cancel_requested = true;
        self.mark_dirty();
    }

    pub(crate) fn cancel_in_flight(&self) -> bool {
        self.cancel_in_flight
    }

    pub(crate) fn set_cancel_in_flight(&mut self, in_flight: bool) {
        self.cancel_in_flight = in_flight;
    }

    pub(crate) fn abandon(&mut self, reason: String) {
        self.abandoned = Some(reason);
        self.mark_dirty();
    }

    pub(crate) fn queue_start(&mut self, params: SearchParameters) {
        self.pending_start = Some(params);
        self.mark_dirty();
    }

    pub(crate) fn take_pending_start(&mut self) -> Option<SearchParameters> {
        self.pending_start.take()
    }

    pub(crate) fn discard_pending_start(&mut self) {
        if self.pending_start.take().is_some() {
            self.mark_dirty();
        }
    }

    pub(crate) fn record_poll_failure(&mut self) {
        self.poll_failures = self.poll_failures.saturating_add(1);
        self.mark_dirty();
    }

    pub(crate) fn reset_poll_failures(&mut self) {
        if self.poll_failures != 0 {
            self.poll_failures = 0;
            self.mark_dirty();
        }
    }

    pub(crate) fn push_log(&mut self, line: LogLine) {
        while self.logs.len() >= self.log_capacity {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
        self.mark_dirty();
    }

    pub(crate) fn set_log_stream(&mut self, status: LogStreamStatus) {
        if self.log_stream != status {
            self.log_stream = status;
            self.mark_dirty();
        }
    }
}
