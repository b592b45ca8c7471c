use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wikipath_core::Backoff;
use wikipath_logging::{wikipath_debug, wikipath_warn};

/// How one poll went, as far as scheduling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job is still running (or its status is not materialized yet).
    Pending,
    /// The poll itself failed; try again on the same policy.
    Transient,
    /// The job reached a terminal state; stop polling.
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// Stopped by a terminal poll result.
    Stopped,
    /// Stopped by [`PollScheduler::stop`].
    CancelledExternally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("poll scheduler cannot start from state {0:?}")]
    AlreadyStarted(SchedulerState),
}

#[derive(Debug)]
struct Progress {
    state: SchedulerState,
    attempts: u32,
}

/// Drives a poll function on a cancellable backoff timer until it reports a
/// terminal outcome. There is no retry ceiling; only [`PollScheduler::stop`]
/// ends an endless run.
#[derive(Debug)]
pub struct PollScheduler {
    progress: Arc<Mutex<Progress>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(Progress {
                state: SchedulerState::Idle,
                attempts: 0,
            })),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Schedules `poll_fn` after `initial_delay`, then after `backoff.delay(n)`
    /// where `n` counts the polls made so far.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(
        &mut self,
        poll_fn: F,
        initial_delay: Duration,
        backoff: Arc<dyn Backoff>,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = PollOutcome> + Send + 'static,
    {
        {
            let mut progress = lock(&self.progress);
            if progress.state != SchedulerState::Idle {
                return Err(SchedulerError::AlreadyStarted(progress.state));
            }
            progress.state = SchedulerState::Running;
        }
        let task = tokio::spawn(run(
            poll_fn,
            initial_delay,
            backoff,
            self.cancel.clone(),
            self.progress.clone(),
        ));
        self.task = Some(task);
        Ok(())
    }

    /// Cancels any pending timer or in-flight poll. Safe from every state.
    pub fn stop(&mut self) {
        {
            let mut progress = lock(&self.progress);
            if matches!(progress.state, SchedulerState::Idle | SchedulerState::Running) {
                progress.state = SchedulerState::CancelledExternally;
            }
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.progress).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Polls completed so far.
    pub fn attempts(&self) -> u32 {
        lock(&self.progress).attempts
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<F, Fut>(
    mut poll_fn: F,
    initial_delay: Duration,
    backoff: Arc<dyn Backoff>,
    cancel: CancellationToken,
    progress: Arc<Mutex<Progress>>,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PollOutcome> + Send + 'static,
{
    let mut delay = initial_delay;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            outcome = poll_fn() => outcome,
        };

        let attempt = {
            let mut progress = lock(&progress);
            progress.attempts += 1;
            progress.attempts
        };
        match outcome {
            PollOutcome::Terminal => {
                let mut progress = lock(&progress);
                if progress.state == SchedulerState::Running {
                    progress.state = SchedulerState::Stopped;
                }
                wikipath_debug!("polling finished after {} attempts", attempt);
                return;
            }
            PollOutcome::Pending => {}
            PollOutcome::Transient => {
                wikipath_warn!("poll attempt {} failed; retrying", attempt);
            }
        }
        delay = backoff.delay(attempt);
        wikipath_debug!("next poll in {:?}", delay);
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}
