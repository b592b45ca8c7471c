//! Wikipath engine: backend IO and the session runner.
mod client;
mod log_stream;
mod scheduler;
mod session;
mod sse;
mod wire;

pub use client::{ClientSettings, HttpJobClient, JobClient};
pub use log_stream::{HttpLogSource, LogSource, LogStream};
pub use scheduler::{PollOutcome, PollScheduler, SchedulerError, SchedulerState};
pub use session::{SearchSession, SessionError, SessionNotification, SessionSettings};
pub use sse::SseDecoder;
