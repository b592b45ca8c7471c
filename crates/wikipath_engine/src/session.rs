use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wikipath_core::{
    update, Backoff, BackoffPolicy, ClientError, Effect, JobHandle, JobStatus, Msg,
    SearchParameters, SessionState, DEFAULT_LOG_CAPACITY,
};
use wikipath_logging::{wikipath_debug, wikipath_error, wikipath_info, wikipath_warn};

use crate::client::JobClient;
use crate::log_stream::{pause, LogSource};
use crate::scheduler::{PollOutcome, PollScheduler};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Wait before the first status poll of a job.
    pub initial_poll_delay: Duration,
    pub backoff: BackoffPolicy,
    /// Reopen a dropped log stream after this long; `None` leaves it closed.
    pub log_reconnect_delay: Option<Duration>,
    pub session_token: Option<String>,
    pub log_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_poll_delay: BackoffPolicy::DEFAULT_INTERVAL,
            backoff: BackoffPolicy::default(),
            log_reconnect_delay: Some(Duration::from_secs(5)),
            session_token: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// A published mutation of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionNotification {
    pub revision: u64,
    pub state: SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("search session has shut down")]
    Closed,
}

enum SessionCommand {
    Dispatch {
        msg: Msg,
        reply: oneshot::Sender<SessionState>,
    },
    Shutdown,
}

struct Observers {
    latest: SessionState,
    subscribers: Vec<mpsc::UnboundedSender<SessionNotification>>,
}

/// Owns one search at a time and serializes every change to its state.
///
/// All mutations run on a single actor task, so poll results, log lines and
/// user commands never race each other. Must be created inside a tokio runtime.
pub struct SearchSession {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    observers: Arc<Mutex<Observers>>,
    task: JoinHandle<()>,
}

impl SearchSession {
    pub fn new(
        client: Arc<dyn JobClient>,
        logs: Arc<dyn LogSource>,
        settings: SessionSettings,
    ) -> Self {
        let state = SessionState::with_log_capacity(settings.log_capacity);
        let observers = Arc::new(Mutex::new(Observers {
            latest: state.clone(),
            subscribers: Vec::new(),
        }));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let backoff: Arc<dyn Backoff> = Arc::new(settings.backoff);

        let actor = SessionActor {
            state,
            client,
            logs,
            settings,
            backoff,
            scheduler: None,
            log_pump: None,
            event_tx,
            observers: observers.clone(),
            shutdown: CancellationToken::new(),
        };
        let task = tokio::spawn(actor.run(cmd_rx, event_rx));

        Self {
            cmd_tx,
            observers,
            task,
        }
    }

    /// Starts a new search, superseding any active one.
    ///
    /// Returns the state right after the request was applied: `Submitting`, or
    /// `Cancelling` while the previous job's cancel is awaited.
    pub async fn start(&self, params: SearchParameters) -> Result<SessionState, SessionError> {
        self.dispatch(Msg::StartRequested(params)).await
    }

    /// Cancels the active job, if any. Calling it again is a no-op.
    pub async fn cancel(&self) -> Result<SessionState, SessionError> {
        self.dispatch(Msg::CancelRequested).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionState {
        lock(&self.observers).latest.clone()
    }

    /// Receives every subsequent mutation in order, starting with the current state.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut observers = lock(&self.observers);
        let current = SessionNotification {
            revision: observers.latest.revision(),
            state: observers.latest.clone(),
        };
        if tx.send(current).is_ok() && !self.cmd_tx.is_closed() {
            observers.subscribers.push(tx);
        }
        rx
    }

    /// Resolves with the first published state that satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<SessionState, SessionError>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut updates = self.subscribe();
        while let Some(notification) = updates.recv().await {
            if predicate(&notification.state) {
                return Ok(notification.state);
            }
        }
        Err(SessionError::Closed)
    }

    /// Resolves once no job is active: terminal, abandoned, failed or idle.
    pub async fn settled(&self) -> Result<SessionState, SessionError> {
        self.wait_until(|state| !state.is_active()).await
    }

    /// Stops polling, closes the log stream and ends the actor.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown);
        if let Err(err) = self.task.await {
            wikipath_error!("session task ended abnormally: {}", err);
        }
    }

    async fn dispatch(&self, msg: Msg) -> Result<SessionState, SessionError> {
        let (reply, applied) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Dispatch { msg, reply })
            .map_err(|_| SessionError::Closed)?;
        applied.await.map_err(|_| SessionError::Closed)
    }
}

struct SessionActor {
    state: SessionState,
    client: Arc<dyn JobClient>,
    logs: Arc<dyn LogSource>,
    settings: SessionSettings,
    backoff: Arc<dyn Backoff>,
    scheduler: Option<PollScheduler>,
    log_pump: Option<JoinHandle<()>>,
    event_tx: mpsc::UnboundedSender<Msg>,
    observers: Arc<Mutex<Observers>>,
    shutdown: CancellationToken,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut events: mpsc::UnboundedReceiver<Msg>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(SessionCommand::Dispatch { msg, reply }) => {
                        self.dispatch(msg);
                        let _ = reply.send(self.state.clone());
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(msg) = events.recv() => self.dispatch(msg),
            }
        }
        self.teardown();
    }

    fn dispatch(&mut self, msg: Msg) {
        let before = self.state.phase();
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if before != state.phase() {
            wikipath_info!(
                "session generation {} phase {:?} -> {:?}",
                state.generation(),
                before,
                state.phase()
            );
        }
        if state.consume_dirty() {
            self.publish(&state);
        }
        self.state = state;
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn publish(&self, state: &SessionState) {
        let mut observers = lock(&self.observers);
        observers.latest = state.clone();
        observers.subscribers.retain(|subscriber| {
            subscriber
                .send(SessionNotification {
                    revision: state.revision(),
                    state: state.clone(),
                })
                .is_ok()
        });
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Submit { generation, params } => {
                wikipath_info!(
                    "submitting search generation={} start={} finish={}",
                    generation,
                    params.start,
                    params.finish
                );
                let client = self.client.clone();
                let events = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = client.submit(&params).await;
                    if let Err(err) = &result {
                        wikipath_warn!("submit generation={} failed: {}", generation, err);
                    }
                    let _ = events.send(Msg::Submitted { generation, result });
                });
            }
            Effect::StartPolling { handle } => self.start_polling(handle),
            Effect::StopPolling => self.stop_polling(),
            Effect::CancelJob { handle } => {
                if self.state.handle() != Some(&handle) {
                    wikipath_warn!("releasing orphaned search_id={}", handle.search_id);
                }
                let client = self.client.clone();
                let events = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = client.cancel(&handle).await;
                    if let Err(err) = &result {
                        wikipath_warn!("cancel of search_id={} failed: {}", handle.search_id, err);
                    }
                    let _ = events.send(Msg::CancelFinished {
                        search_id: handle.search_id,
                        result,
                    });
                });
            }
            Effect::OpenLogStream => self.open_log_stream(),
        }
    }

    fn start_polling(&mut self, handle: JobHandle) {
        // At most one poll loop exists at any instant.
        self.stop_polling();
        wikipath_info!("polling search_id={}", handle.search_id);

        let client = self.client.clone();
        let events = self.event_tx.clone();
        let poll_fn = move || {
            let client = client.clone();
            let events = events.clone();
            let handle = handle.clone();
            async move {
                let result = client.get_status(&handle).await;
                let outcome = classify(&result);
                let _ = events.send(Msg::StatusPolled {
                    search_id: handle.search_id,
                    result,
                });
                outcome
            }
        };

        let mut scheduler = PollScheduler::new();
        match scheduler.start(
            poll_fn,
            self.settings.initial_poll_delay,
            self.backoff.clone(),
        ) {
            Ok(()) => self.scheduler = Some(scheduler),
            Err(err) => wikipath_error!("could not start polling: {}", err),
        }
    }

    fn stop_polling(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            wikipath_debug!("stopping poll loop after {} attempts", scheduler.attempts());
            scheduler.stop();
        }
    }

    fn open_log_stream(&mut self) {
        if self
            .log_pump
            .as_ref()
            .is_some_and(|pump| !pump.is_finished())
        {
            return;
        }
        let pump = pump_logs(
            self.logs.clone(),
            self.settings.session_token.clone(),
            self.settings.log_reconnect_delay,
            self.event_tx.clone(),
            self.shutdown.child_token(),
        );
        self.log_pump = Some(tokio::spawn(pump));
    }

    fn teardown(&mut self) {
        wikipath_info!("search session shutting down");
        self.stop_polling();
        self.shutdown.cancel();
        lock(&self.observers).subscribers.clear();
    }
}

fn classify(result: &Result<JobStatus, ClientError>) -> PollOutcome {
    match result {
        Ok(status) if status.is_terminal() => PollOutcome::Terminal,
        Ok(_) | Err(ClientError::NotYetAvailable) => PollOutcome::Pending,
        Err(_) => PollOutcome::Transient,
    }
}

/// Forwards log lines into the session until shutdown, reconnecting if configured.
async fn pump_logs(
    source: Arc<dyn LogSource>,
    session_token: Option<String>,
    reconnect_delay: Option<Duration>,
    events: mpsc::UnboundedSender<Msg>,
    stop: CancellationToken,
) {
    loop {
        let opened = tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            opened = source.open(session_token.as_deref()) => opened,
        };
        let reason = match opened {
            Ok(mut stream) => {
                if events.send(Msg::LogStreamOpened).is_err() {
                    return;
                }
                loop {
                    let line = tokio::select! {
                        biased;
                        _ = stop.cancelled() => {
                            stream.close();
                            return;
                        }
                        line = stream.next_line() => line,
                    };
                    match line {
                        Some(line) => {
                            if events.send(Msg::LogReceived(line)).is_err() {
                                return;
                            }
                        }
                        None => break,
                    }
                }
                stream
                    .take_error()
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "stream ended".to_string())
            }
            Err(err) => err.to_string(),
        };

        wikipath_warn!("log stream closed: {}", reason);
        if events.send(Msg::LogStreamClosed { reason }).is_err() {
            return;
        }
        let Some(delay) = reconnect_delay else {
            return;
        };
        if !pause(delay, &stop).await {
            return;
        }
    }
}

fn lock(observers: &Mutex<Observers>) -> MutexGuard<'_, Observers> {
    observers.lock().unwrap_or_else(PoisonError::into_inner)
}
