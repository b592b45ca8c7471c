use std::fmt;

use thiserror::Error;

/// Failures reported by the backend job API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The backend rejected the parameters. Not retried.
    #[error("invalid search: {0}")]
    Validation(String),
    /// The backend is throttling requests. The user must resubmit.
    #[error("You have made too many requests. Please try again later.")]
    RateLimited,
    /// Status has not materialized yet for a just-submitted job.
    #[error("search status not yet available")]
    NotYetAvailable,
    #[error("{kind}: {message}")]
    Transport { kind: TransportKind, message: String },
}

impl ClientError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        ClientError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Whether the poll loop should simply try again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::NotYetAvailable | ClientError::Transport { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Network,
    HttpStatus(u16),
    Decode,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::Network => write!(f, "network error"),
            TransportKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportKind::Decode => write!(f, "malformed response"),
        }
    }
}
