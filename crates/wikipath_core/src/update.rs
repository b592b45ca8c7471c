use crate::{
    ClientError, Effect, JobStatus, LogStreamStatus, Msg, Phase, SearchParameters, SessionState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SessionState, msg: Msg) -> (SessionState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested(params) => start_requested(&mut state, params),
        Msg::Submitted { generation, result } => {
            if generation != state.generation() || state.phase() != Phase::Submitting {
                // A superseded submission still created a backend job; release it.
                return match result {
                    Ok(handle) => (state, vec![Effect::CancelJob { handle }]),
                    Err(_) => (state, Vec::new()),
                };
            }
            match result {
                Ok(handle) => {
                    state.set_handle(handle.clone());
                    if state.cancel_requested() {
                        state.set_phase(Phase::Cancelling);
                        state.set_cancel_in_flight(true);
                        vec![Effect::CancelJob { handle }]
                    } else {
                        state.set_phase(Phase::Polling);
                        vec![Effect::StartPolling { handle }, Effect::OpenLogStream]
                    }
                }
                Err(err) => {
                    state.set_status(JobStatus::Failed {
                        reason: err.to_string(),
                    });
                    state.set_phase(Phase::Settled);
                    Vec::new()
                }
            }
        }
        Msg::StatusPolled { search_id, result } => {
            if !is_current_job(&state, &search_id) || state.has_terminal_status() {
                return (state, Vec::new());
            }
            match state.phase() {
                Phase::Polling => status_polled(&mut state, result),
                // Polling already stopped; only a terminal answer still counts.
                Phase::Cancelling => {
                    if let Ok(status) = result {
                        if status.is_terminal() {
                            state.set_status(status);
                        }
                    }
                    Vec::new()
                }
                Phase::Idle | Phase::Submitting | Phase::Settled => Vec::new(),
            }
        }
        Msg::CancelRequested => match state.phase() {
            Phase::Submitting if !state.cancel_requested() => {
                // Applied as soon as the handle arrives.
                state.request_cancel();
                Vec::new()
            }
            Phase::Polling => match state.handle().cloned() {
                Some(handle) => {
                    state.request_cancel();
                    state.set_cancel_in_flight(true);
                    state.set_phase(Phase::Cancelling);
                    vec![Effect::StopPolling, Effect::CancelJob { handle }]
                }
                None => Vec::new(),
            },
            Phase::Cancelling => {
                // A restart queued behind this cancel is withdrawn too.
                state.discard_pending_start();
                Vec::new()
            }
            Phase::Idle | Phase::Submitting | Phase::Settled => Vec::new(),
        },
        Msg::CancelFinished { search_id, result } => {
            if !is_current_job(&state, &search_id) || !state.cancel_in_flight() {
                return (state, Vec::new());
            }
            state.set_cancel_in_flight(false);
            match result {
                Ok(_) => {
                    // The job may have completed before the cancel landed; keep that.
                    if !state.has_terminal_status() {
                        state.set_status(JobStatus::Aborted);
                    }
                }
                Err(err) => {
                    if !state.has_terminal_status() {
                        state.abandon(err.to_string());
                    }
                }
            }
            state.set_phase(Phase::Settled);
            match state.take_pending_start() {
                Some(params) => submit(&mut state, params),
                None => Vec::new(),
            }
        }
        Msg::LogStreamOpened => {
            state.set_log_stream(LogStreamStatus::Connected);
            Vec::new()
        }
        Msg::LogReceived(line) => {
            state.push_log(line);
            Vec::new()
        }
        Msg::LogStreamClosed { reason } => {
            state.set_log_stream(LogStreamStatus::Lost(reason));
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_requested(state: &mut SessionState, params: SearchParameters) -> Vec<Effect> {
    match state.phase() {
        Phase::Polling | Phase::Cancelling => {
            // The old job must be acknowledged as cancelled before submitting.
            state.queue_start(params);
            if state.cancel_in_flight() {
                return Vec::new();
            }
            let Some(handle) = state.handle().cloned() else {
                return Vec::new();
            };
            state.request_cancel();
            state.set_cancel_in_flight(true);
            state.set_phase(Phase::Cancelling);
            vec![Effect::StopPolling, Effect::CancelJob { handle }]
        }
        Phase::Idle | Phase::Submitting | Phase::Settled => submit(state, params),
    }
}

fn submit(state: &mut SessionState, params: SearchParameters) -> Vec<Effect> {
    let generation = state.begin_search(params.clone());
    vec![Effect::Submit { generation, params }]
}

fn status_polled(state: &mut SessionState, result: Result<JobStatus, ClientError>) -> Vec<Effect> {
    match result {
        Ok(status) => {
            state.reset_poll_failures();
            let terminal = status.is_terminal();
            state.set_status(status);
            if terminal {
                state.set_phase(Phase::Settled);
                vec![Effect::StopPolling]
            } else {
                Vec::new()
            }
        }
        Err(ClientError::NotYetAvailable) => {
            state.reset_poll_failures();
            if state.status().is_none() {
                state.set_status(JobStatus::InProgress { discovered: 0 });
            }
            Vec::new()
        }
        Err(_) => {
            state.record_poll_failure();
            Vec::new()
        }
    }
}

fn is_current_job(state: &SessionState, search_id: &str) -> bool {
    state
        .handle()
        .is_some_and(|handle| handle.search_id == search_id)
}
