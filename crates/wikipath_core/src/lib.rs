//! Wikipath core: pure search-session state machine and presentation helpers.
mod backoff;
mod effect;
mod error;
mod job;
mod msg;
mod params;
mod state;
mod update;
mod view_model;

pub use backoff::{Backoff, BackoffPolicy};
pub use effect::Effect;
pub use error::{ClientError, TransportKind};
pub use job::{CancelAck, JobHandle, JobStatus, LogLine};
pub use msg::Msg;
pub use params::{Heuristic, PageRef, SearchMethod, SearchParameters};
pub use state::{LogStreamStatus, Phase, SessionState, DEFAULT_LOG_CAPACITY};
pub use update::update;
pub use view_model::{
    format_elapsed, page_label, present, DisplayModel, PathLink, Statistics,
    POLL_FAILURE_PATIENCE,
};
