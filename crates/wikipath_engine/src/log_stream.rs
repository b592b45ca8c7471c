use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wikipath_core::{ClientError, LogLine, TransportKind};
use wikipath_logging::{wikipath_debug, wikipath_warn};

use crate::client::{endpoint, map_reqwest_error, ClientSettings};
use crate::sse::SseDecoder;

const LINE_BUFFER: usize = 256;

/// Opens subscriptions to the process-wide progress log channel.
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    async fn open(&self, session_token: Option<&str>) -> Result<LogStream, ClientError>;
}

/// A single-use subscription to the log channel.
///
/// Lines carry a sequence number starting at 0 for this connection. After
/// [`LogStream::close`] (or drop) no further line is delivered.
#[derive(Debug)]
pub struct LogStream {
    lines: mpsc::Receiver<Result<String, ClientError>>,
    cancel: CancellationToken,
    next_sequence: u64,
    closed: bool,
    error: Option<ClientError>,
}

impl LogStream {
    /// Wraps a channel fed by some producer; cancelling `cancel` tells it to stop.
    pub fn new(
        lines: mpsc::Receiver<Result<String, ClientError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lines,
            cancel,
            next_sequence: 0,
            closed: false,
            error: None,
        }
    }

    /// Waits for the next line. `None` once the stream closed or failed.
    pub async fn next_line(&mut self) -> Option<LogLine> {
        if self.closed {
            return None;
        }
        let received = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            received = self.lines.recv() => received,
        };
        match received {
            Some(Ok(text)) => {
                let line = LogLine::new(text, self.next_sequence);
                self.next_sequence += 1;
                Some(line)
            }
            Some(Err(err)) => {
                self.error = Some(err);
                self.close();
                None
            }
            None => {
                self.close();
                None
            }
        }
    }

    /// Releases the connection. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cancel.cancel();
            self.lines.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Why the stream ended, if it ended with an error.
    pub fn take_error(&mut self) -> Option<ClientError> {
        self.error.take()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// `GET /logs` as a server-sent-events subscription.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpLogSource {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let base = settings.base()?;
        // No total timeout: the body never ends on its own.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { base, client })
    }
}

#[async_trait::async_trait]
impl LogSource for HttpLogSource {
    async fn open(&self, session_token: Option<&str>) -> Result<LogStream, ClientError> {
        let mut url = endpoint(&self.base, &["logs"])?;
        if let Some(token) = session_token {
            url.query_pairs_mut().append_pair("session", token);
        }
        wikipath_debug!("GET {} (event stream)", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::transport(
                TransportKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    chunk = body.next() => chunk,
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        for text in decoder.push(&bytes) {
                            if tx.send(Ok(text)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        wikipath_warn!("log stream read failed: {}", err);
                        let _ = tx.send(Err(map_reqwest_error(err))).await;
                        break;
                    }
                    None => break,
                }
            }
            wikipath_debug!("log stream reader finished");
        });

        Ok(LogStream::new(rx, cancel))
    }
}

/// Sleeps for `delay`; false if `stop` fired first.
pub(crate) async fn pause(delay: Duration, stop: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
