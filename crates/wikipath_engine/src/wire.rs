//! JSON bodies exchanged with the search backend.
use serde::{Deserialize, Serialize};
use wikipath_core::{JobStatus, SearchParameters};

#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub start: &'a str,
    pub finish: &'a str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic: Option<&'static str>,
}

impl<'a> SubmitRequest<'a> {
    pub fn from_params(params: &'a SearchParameters) -> Self {
        Self {
            start: &params.start,
            finish: &params.finish,
            method: params.method.as_wire(),
            heuristic: params.effective_heuristic().map(|h| h.as_wire()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub search_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelRequest<'a> {
    pub search_id: &'a str,
}

/// Any JSON error body; the backend puts human text in `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub path: Option<Vec<String>>,
    #[serde(default)]
    pub discovered: Option<u64>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub search_method: Option<String>,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn into_status(self) -> JobStatus {
        let discovered = self.discovered.unwrap_or(0);
        let elapsed_seconds = self.time.unwrap_or(0.0).max(0.0);
        if self.completed {
            match self.path {
                Some(path) if !path.is_empty() => JobStatus::Completed {
                    path,
                    discovered,
                    elapsed_seconds,
                    method: self.search_method.unwrap_or_default(),
                },
                _ => JobStatus::NotFound {
                    discovered,
                    elapsed_seconds,
                },
            }
        } else if self.aborted {
            JobStatus::Aborted
        } else if let Some(reason) = self.error {
            JobStatus::Failed { reason }
        } else {
            JobStatus::InProgress { discovered }
        }
    }
}
