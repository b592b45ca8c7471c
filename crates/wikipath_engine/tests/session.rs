use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use wikipath_core::{
    BackoffPolicy, CancelAck, ClientError, JobHandle, JobStatus, LogStreamStatus, Phase,
    SearchParameters, SessionState, TransportKind,
};
use wikipath_engine::{JobClient, LogSource, LogStream, SearchSession, SessionSettings};

const TICK: Duration = Duration::from_millis(5);
const PATIENCE: Duration = Duration::from_secs(5);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(wikipath_logging::initialize_for_tests);
}

/// In-memory backend: ids are handed out as s1, s2, ...; statuses follow a
/// per-job script and stay `InProgress` once it runs out.
#[derive(Default)]
struct ScriptedClient {
    issued: AtomicU32,
    submit_error: Mutex<Option<ClientError>>,
    cancel_error: Mutex<Option<ClientError>>,
    /// When set, cancels wait for a permit before answering.
    cancel_gate: Mutex<Option<Arc<Notify>>>,
    scripts: Mutex<HashMap<String, VecDeque<Result<JobStatus, ClientError>>>>,
    polls: Mutex<Vec<String>>,
    cancels: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn script(&self, search_id: &str, statuses: Vec<Result<JobStatus, ClientError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(search_id.to_string(), statuses.into());
    }

    fn polls_of(&self, search_id: &str) -> usize {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == search_id)
            .count()
    }

    fn cancels(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl JobClient for ScriptedClient {
    async fn submit(&self, _params: &SearchParameters) -> Result<JobHandle, ClientError> {
        if let Some(err) = self.submit_error.lock().unwrap().clone() {
            return Err(err);
        }
        let id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(JobHandle::new(format!("s{id}"), Utc::now()))
    }

    async fn get_status(&self, handle: &JobHandle) -> Result<JobStatus, ClientError> {
        self.polls.lock().unwrap().push(handle.search_id.clone());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&handle.search_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(JobStatus::InProgress { discovered: 0 }))
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<CancelAck, ClientError> {
        self.cancels.lock().unwrap().push(handle.search_id.clone());
        let gate = self.cancel_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.cancel_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(CancelAck::Acknowledged),
        }
    }
}

/// Log channel fed by the test through the returned sender; opens once.
struct ChannelLogs {
    lines: Mutex<Option<mpsc::Receiver<Result<String, ClientError>>>>,
}

impl ChannelLogs {
    fn new() -> (Arc<Self>, mpsc::Sender<Result<String, ClientError>>) {
        let (tx, rx) = mpsc::channel(16);
        let logs = Arc::new(Self {
            lines: Mutex::new(Some(rx)),
        });
        (logs, tx)
    }
}

#[async_trait::async_trait]
impl LogSource for ChannelLogs {
    async fn open(&self, _session_token: Option<&str>) -> Result<LogStream, ClientError> {
        match self.lines.lock().unwrap().take() {
            Some(rx) => Ok(LogStream::new(rx, CancellationToken::new())),
            None => Err(ClientError::transport(
                TransportKind::Network,
                "already consumed",
            )),
        }
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        initial_poll_delay: TICK,
        backoff: BackoffPolicy::Fixed(TICK),
        log_reconnect_delay: None,
        ..SessionSettings::default()
    }
}

fn session_with(client: Arc<ScriptedClient>) -> SearchSession {
    let (logs, _tx) = ChannelLogs::new();
    SearchSession::new(client, logs, settings())
}

async fn settled(session: &SearchSession) -> SessionState {
    tokio::time::timeout(PATIENCE, session.settled())
        .await
        .expect("session never settled")
        .expect("session closed")
}

async fn until(
    session: &SearchSession,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(PATIENCE, session.wait_until(predicate))
        .await
        .expect("condition never reached")
        .expect("session closed")
}

fn completed(path: &[&str], discovered: u64, elapsed_seconds: f64) -> JobStatus {
    JobStatus::Completed {
        path: path.iter().map(|page| page.to_string()).collect(),
        discovered,
        elapsed_seconds,
        method: String::new(),
    }
}

#[tokio::test]
async fn search_completes_and_renders_path() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    client.script(
        "s1",
        vec![
            Ok(JobStatus::InProgress { discovered: 0 }),
            Ok(JobStatus::InProgress { discovered: 0 }),
            Ok(completed(&["A", "C", "B"], 42, 3.14)),
        ],
    );
    let session = session_with(client.clone());

    let accepted = session.start(SearchParameters::new("A", "B")).await.unwrap();
    assert_eq!(accepted.phase(), Phase::Submitting);

    let state = settled(&session).await;
    assert_eq!(state.handle().map(|h| h.search_id.as_str()), Some("s1"));
    let view = state.view();
    let pages: Vec<_> = view.path_links.iter().map(|link| link.url.as_str()).collect();
    assert_eq!(pages, vec!["A", "C", "B"]);
    let stats = view.statistics.expect("statistics");
    assert_eq!(stats.discovered, 42);
    assert_eq!(stats.elapsed, "3.14 seconds");

    assert_eq!(client.polls_of("s1"), 3);
    tokio::time::sleep(TICK * 10).await;
    assert_eq!(client.polls_of("s1"), 3);
}

#[tokio::test]
async fn not_yet_available_keeps_searching() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    client.script(
        "s1",
        vec![
            Err(ClientError::NotYetAvailable),
            Err(ClientError::NotYetAvailable),
            Err(ClientError::NotYetAvailable),
            Ok(JobStatus::InProgress { discovered: 0 }),
            Ok(completed(&["A", "B"], 2, 0.5)),
        ],
    );
    let session = session_with(client.clone());
    let mut updates = session.subscribe();

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    let state = settled(&session).await;
    assert_eq!(state.view().headline, "Path found.");

    while let Ok(notification) = updates.try_recv() {
        let state = notification.state;
        assert!(!matches!(state.status(), Some(JobStatus::Failed { .. })));
        if state.phase() == Phase::Polling {
            assert_eq!(state.view().headline, "Searching...");
        }
    }
    assert_eq!(client.polls_of("s1"), 5);
}

#[tokio::test]
async fn transport_errors_during_polling_are_retried() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let flaky = || {
        Err(ClientError::transport(
            TransportKind::Network,
            "connection reset",
        ))
    };
    client.script(
        "s1",
        vec![flaky(), flaky(), flaky(), flaky(), Ok(completed(&["A", "B"], 1, 1.0))],
    );
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    let troubled = until(&session, |state| state.poll_failures() >= 3).await;
    assert!(troubled.view().notice.is_some());

    let state = settled(&session).await;
    assert_eq!(state.poll_failures(), 0);
    assert_eq!(state.view().headline, "Path found.");
}

#[tokio::test]
async fn cancel_while_in_progress_aborts_and_stops_polling() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| state.status().is_some()).await;

    let cancelling = session.cancel().await.unwrap();
    assert_eq!(cancelling.phase(), Phase::Cancelling);
    let state = settled(&session).await;
    assert_eq!(state.status(), Some(&JobStatus::Aborted));
    assert!(state.cancel_requested());
    assert_eq!(client.cancels(), vec!["s1"]);

    let polls = client.polls_of("s1");
    tokio::time::sleep(TICK * 10).await;
    assert_eq!(client.polls_of("s1"), polls);
}

#[tokio::test]
async fn cancel_twice_matches_cancel_once() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| state.phase() == Phase::Polling).await;
    session.cancel().await.unwrap();
    session.cancel().await.unwrap();
    let state = settled(&session).await;
    session.cancel().await.unwrap();

    assert_eq!(state.status(), Some(&JobStatus::Aborted));
    assert_eq!(client.cancels(), vec!["s1"]);
    assert_eq!(session.snapshot().status(), Some(&JobStatus::Aborted));
}

#[tokio::test]
async fn unconfirmed_cancel_is_reported_as_abandoned() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    *client.cancel_error.lock().unwrap() = Some(ClientError::transport(
        TransportKind::HttpStatus(500),
        "500 Internal Server Error",
    ));
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| state.status().is_some()).await;
    session.cancel().await.unwrap();

    let state = settled(&session).await;
    assert!(state.abandoned().is_some());
    assert!(state
        .view()
        .headline
        .starts_with("Search abandoned (cancel not confirmed)"));
}

#[tokio::test]
async fn restart_supersedes_previous_job() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    client.script("s2", vec![Ok(completed(&["X", "Z", "Y"], 9, 2.0))]);
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| state.status().is_some()).await;

    let superseding = session
        .start(SearchParameters::new("X", "Y"))
        .await
        .unwrap();
    assert_eq!(superseding.phase(), Phase::Cancelling);
    assert!(superseding.pending_start().is_some());

    let state = settled(&session).await;
    assert_eq!(state.handle().map(|h| h.search_id.as_str()), Some("s2"));
    assert_eq!(state.params().map(|p| p.start.as_str()), Some("X"));
    assert_eq!(state.view().path_links.len(), 3);
    assert_eq!(client.cancels(), vec!["s1"]);

    let first_polls = client.polls_of("s1");
    tokio::time::sleep(TICK * 10).await;
    assert_eq!(client.polls_of("s1"), first_polls);
}

#[tokio::test]
async fn cancel_after_restart_withdraws_queued_search() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let gate = Arc::new(Notify::new());
    *client.cancel_gate.lock().unwrap() = Some(gate.clone());
    let session = session_with(client.clone());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| state.status().is_some()).await;
    let queued = session
        .start(SearchParameters::new("X", "Y"))
        .await
        .unwrap();
    assert!(queued.pending_start().is_some());

    let cancelled = session.cancel().await.unwrap();
    assert_eq!(cancelled.phase(), Phase::Cancelling);
    assert_eq!(cancelled.pending_start(), None);

    gate.notify_one();
    let state = settled(&session).await;
    assert_eq!(state.status(), Some(&JobStatus::Aborted));
    assert_eq!(state.handle().map(|h| h.search_id.as_str()), Some("s1"));
    assert_eq!(state.params().map(|p| p.start.as_str()), Some("A"));

    tokio::time::sleep(TICK * 10).await;
    assert_eq!(client.issued.load(Ordering::SeqCst), 1);
    assert_eq!(client.cancels(), vec!["s1"]);
    assert_eq!(client.polls_of("s2"), 0);
}

#[tokio::test]
async fn submit_failure_is_surfaced_without_polling() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    *client.submit_error.lock().unwrap() = Some(ClientError::Validation(
        "unknown page: Nowhere".to_string(),
    ));
    let session = session_with(client.clone());

    session
        .start(SearchParameters::new("A", "Nowhere"))
        .await
        .unwrap();
    let state = settled(&session).await;

    assert_eq!(state.handle(), None);
    assert_eq!(
        state.view().headline,
        "Error: invalid search: unknown page: Nowhere"
    );
    assert!(client.polls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn log_lines_stream_independently_of_the_job() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let (logs, tx) = ChannelLogs::new();
    let session = SearchSession::new(client, logs, settings());

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    until(&session, |state| *state.log_stream() == LogStreamStatus::Connected).await;

    tx.send(Ok("Visiting A".to_string())).await.unwrap();
    tx.send(Ok("Visiting C".to_string())).await.unwrap();
    let state = until(&session, |state| state.log_count() == 2).await;
    let sequences: Vec<_> = state.logs().map(|line| line.sequence).collect();
    assert_eq!(sequences, vec![0, 1]);
    assert_eq!(state.view().log_lines, vec!["Visiting A", "Visiting C"]);

    // Losing the log channel is reported but the job keeps running.
    drop(tx);
    let state = until(&session, |state| {
        matches!(state.log_stream(), LogStreamStatus::Lost(_))
    })
    .await;
    assert_eq!(state.phase(), Phase::Polling);
    assert!(state.view().notice.is_some());
}

#[tokio::test]
async fn notifications_arrive_in_mutation_order() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    client.script(
        "s1",
        vec![
            Ok(JobStatus::InProgress { discovered: 1 }),
            Ok(JobStatus::InProgress { discovered: 2 }),
            Ok(completed(&["A", "B"], 3, 0.1)),
        ],
    );
    let session = session_with(client);
    let mut updates = session.subscribe();

    session.start(SearchParameters::new("A", "B")).await.unwrap();
    settled(&session).await;

    let mut revisions = Vec::new();
    while let Ok(notification) = updates.try_recv() {
        assert_eq!(notification.revision, notification.state.revision());
        revisions.push(notification.revision);
    }
    assert!(revisions.len() >= 4);
    assert!(revisions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn shutdown_closes_subscriptions() {
    init_logging();
    let client = Arc::new(ScriptedClient::default());
    let session = session_with(client);
    let mut updates = session.subscribe();
    assert!(updates.recv().await.is_some());

    session.shutdown().await;
    let closed = tokio::time::timeout(PATIENCE, updates.recv())
        .await
        .expect("subscription stayed open");
    assert_eq!(closed, None);
}
