use crate::{JobStatus, LogStreamStatus, Phase, SessionState};

/// Consecutive failed polls before the presenter warns about connectivity.
pub const POLL_FAILURE_PATIENCE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayModel {
    /// Human-readable summary of where the search stands.
    pub headline: String,
    pub search_id: Option<String>,
    pub path_links: Vec<PathLink>,
    pub log_lines: Vec<String>,
    /// Present once the job reports discovery counts.
    pub statistics: Option<Statistics>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLink {
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub discovered: u64,
    /// "Yes" or "No".
    pub path_found: String,
    pub path_length: usize,
    /// Empty while the search is still running.
    pub elapsed: String,
    pub method: String,
}

/// Renders a session snapshot for display. Total over every state.
pub fn present(state: &SessionState) -> DisplayModel {
    let status = state.status();
    let fallback_method = state
        .params()
        .map(|params| params.method.display_name().to_string())
        .unwrap_or_default();

    let path_links = match status {
        Some(JobStatus::Completed { path, .. }) => path
            .iter()
            .map(|url| PathLink {
                url: url.clone(),
                label: page_label(url),
            })
            .collect(),
        _ => Vec::new(),
    };

    let statistics = match status {
        Some(JobStatus::InProgress { discovered }) => Some(Statistics {
            discovered: *discovered,
            path_found: "No".to_string(),
            path_length: 0,
            elapsed: String::new(),
            method: fallback_method,
        }),
        Some(JobStatus::Completed {
            path,
            discovered,
            elapsed_seconds,
            method,
        }) => Some(Statistics {
            discovered: *discovered,
            path_found: "Yes".to_string(),
            // Hops between pages, not pages.
            path_length: path.len().saturating_sub(1),
            elapsed: format_elapsed(*elapsed_seconds),
            method: if method.is_empty() {
                fallback_method
            } else {
                method.clone()
            },
        }),
        Some(JobStatus::NotFound {
            discovered,
            elapsed_seconds,
        }) => Some(Statistics {
            discovered: *discovered,
            path_found: "No".to_string(),
            path_length: 0,
            elapsed: format_elapsed(*elapsed_seconds),
            method: fallback_method,
        }),
        Some(JobStatus::Aborted) | Some(JobStatus::Failed { .. }) | None => None,
    };

    DisplayModel {
        headline: headline(state),
        search_id: state.handle().map(|handle| handle.search_id.clone()),
        path_links,
        log_lines: state.logs().map(|line| line.text.clone()).collect(),
        statistics,
        notice: notice(state),
    }
}

fn headline(state: &SessionState) -> String {
    if let Some(reason) = state.abandoned() {
        return format!("Search abandoned (cancel not confirmed): {reason}");
    }
    match (state.phase(), state.status()) {
        (_, Some(JobStatus::Completed { .. })) => "Path found.".to_string(),
        (_, Some(JobStatus::NotFound { .. })) => "No path found.".to_string(),
        (_, Some(JobStatus::Aborted)) => "Search has been aborted.".to_string(),
        (_, Some(JobStatus::Failed { reason })) => format!("Error: {reason}"),
        (Phase::Idle, _) => "Ready.".to_string(),
        (Phase::Submitting, _) => "Submitting search...".to_string(),
        (Phase::Cancelling, _) => "Cancelling search...".to_string(),
        (Phase::Polling, _) => "Searching...".to_string(),
        (Phase::Settled, _) => "Search stopped.".to_string(),
    }
}

fn notice(state: &SessionState) -> Option<String> {
    if state.phase() == Phase::Polling && state.poll_failures() >= POLL_FAILURE_PATIENCE {
        return Some(format!(
            "Having trouble reaching the server ({} failed status checks); still trying.",
            state.poll_failures()
        ));
    }
    match state.log_stream() {
        LogStreamStatus::Lost(reason) => Some(format!("Live log disconnected: {reason}")),
        LogStreamStatus::Disconnected | LogStreamStatus::Connected => None,
    }
}

/// Formats seconds the way the statistics panel shows them, e.g. `7.50 seconds`.
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.2} seconds")
}

/// Human label for a page reference.
///
/// Article URLs are shown by title: the last path segment, percent-decoded, with
/// underscores as spaces. Anything that is not an absolute URL is shown verbatim.
pub fn page_label(page: &str) -> String {
    let Ok(url) = url::Url::parse(page) else {
        return page.to_string();
    };
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty());
    match segment {
        Some(segment) => percent_decode(segment).replace('_', " "),
        None => page.to_string(),
    }
}

fn percent_decode(segment: &str) -> String {
    percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}
