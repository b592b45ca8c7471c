use crate::{JobHandle, SearchParameters};

/// IO the session runner must perform on behalf of [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Submit {
        generation: u64,
        params: SearchParameters,
    },
    /// Replace any running poll loop with one for `handle`.
    StartPolling { handle: JobHandle },
    StopPolling,
    CancelJob { handle: JobHandle },
    /// Ensure the process-wide log channel is open.
    OpenLogStream,
}
