//! Incremental decoder for `text/event-stream` bodies.

use wikipath_logging::wikipath_warn;

/// Longest line kept while waiting for its newline.
const MAX_LINE_BYTES: usize = 256 * 1024;

/// Turns arbitrary body chunks into the `data` payloads of complete events.
///
/// Only `data` fields matter to the log channel; `event`, `id`, `retry` and
/// comment lines are skipped. Chunks may split lines (and UTF-8 sequences)
/// anywhere. A line that grows past 256 KiB is discarded up to its
/// newline, along with the event it belongs to.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if self.pending.len() > MAX_LINE_BYTES {
            wikipath_warn!(
                "dropping event stream line longer than {} bytes",
                MAX_LINE_BYTES
            );
            self.pending.clear();
            self.data.clear();
            self.discarding = true;
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let event = self.data.join("\n");
            self.data.clear();
            return Some(event);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}
