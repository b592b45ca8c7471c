use std::time::Duration;

/// Maps the number of polls made so far to the delay before the next one.
///
/// Implementations must be pure: the same attempt always yields the same delay.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay for every attempt.
    Fixed(Duration),
    /// `initial` until `escalate_after` polls have been made, then `escalated`.
    Escalating {
        initial: Duration,
        escalated: Duration,
        escalate_after: u32,
    },
}

impl BackoffPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
    pub const ESCALATED_INTERVAL: Duration = Duration::from_millis(150_000);

    /// 2 s before the first answer, 150 s after any "still running" answer.
    pub fn escalating() -> Self {
        BackoffPolicy::Escalating {
            initial: Self::DEFAULT_INTERVAL,
            escalated: Self::ESCALATED_INTERVAL,
            escalate_after: 1,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(Self::DEFAULT_INTERVAL)
    }
}

impl Backoff for BackoffPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed(interval) => interval,
            BackoffPolicy::Escalating {
                initial,
                escalated,
                escalate_after,
            } => {
                if attempt < escalate_after {
                    initial
                } else {
                    // Never step down if configured with escalated < initial.
                    escalated.max(initial)
                }
            }
        }
    }
}
