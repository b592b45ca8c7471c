use crate::{CancelAck, ClientError, JobHandle, JobStatus, LogLine, SearchParameters};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User asked for a new search; supersedes any active one.
    StartRequested(SearchParameters),
    /// Backend answered the submission for `generation`.
    Submitted {
        generation: u64,
        result: Result<JobHandle, ClientError>,
    },
    /// One poll of `search_id` finished.
    StatusPolled {
        search_id: String,
        result: Result<JobStatus, ClientError>,
    },
    /// User clicked cancel.
    CancelRequested,
    /// Backend answered a cancel request for `search_id`.
    CancelFinished {
        search_id: String,
        result: Result<CancelAck, ClientError>,
    },
    LogStreamOpened,
    LogReceived(LogLine),
    LogStreamClosed { reason: String },
    /// Changes nothing; `update` must leave the state clean for it.
    NoOp,
}
