use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use url::Url;
use wikipath_core::{
    CancelAck, ClientError, JobHandle, JobStatus, SearchParameters, TransportKind,
};
use wikipath_logging::{wikipath_debug, wikipath_warn};

use crate::wire::{CancelRequest, MessageBody, StatusResponse, SubmitRequest, SubmitResponse};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Root of the search backend, e.g. `http://127.0.0.1:5001`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    /// Parses `base_url`, making sure relative endpoints nest under it.
    pub(crate) fn base(&self) -> Result<Url, ClientError> {
        let mut base = Url::parse(&self.base_url)
            .map_err(|err| ClientError::Validation(format!("invalid server url: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "invalid server url: {}",
                self.base_url
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }
}

/// The backend job API: submit a search, poll it, cancel it.
#[async_trait::async_trait]
pub trait JobClient: Send + Sync {
    /// Creates exactly one backend job per successful call.
    async fn submit(&self, params: &SearchParameters) -> Result<JobHandle, ClientError>;

    /// Idempotent read of the job's current status.
    async fn get_status(&self, handle: &JobHandle) -> Result<JobStatus, ClientError>;

    /// Idempotent; cancelling a finished job succeeds with [`CancelAck::AlreadyFinished`].
    async fn cancel(&self, handle: &JobHandle) -> Result<CancelAck, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpJobClient {
    base: Url,
    client: reqwest::Client,
}

impl HttpJobClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let base = settings.base()?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        endpoint(&self.base, segments)
    }
}

#[async_trait::async_trait]
impl JobClient for HttpJobClient {
    async fn submit(&self, params: &SearchParameters) -> Result<JobHandle, ClientError> {
        let url = self.endpoint(&["find_path"])?;
        wikipath_debug!(
            "POST {} start={} finish={} method={}",
            url,
            params.start,
            params.finish,
            params.method
        );
        let response = self
            .client
            .post(url)
            .json(&SubmitRequest::from_params(params))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(ClientError::RateLimited),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.json::<MessageBody>().await.unwrap_or_default();
                let message = body.message.unwrap_or_else(|| status.to_string());
                return Err(ClientError::Validation(message));
            }
            _ if !status.is_success() => {
                return Err(ClientError::transport(
                    TransportKind::HttpStatus(status.as_u16()),
                    status.to_string(),
                ));
            }
            _ => {}
        }

        let accepted: SubmitResponse = response.json().await.map_err(map_reqwest_error)?;
        match accepted.search_id {
            Some(search_id) if !search_id.is_empty() => {
                wikipath_debug!("search accepted search_id={}", search_id);
                Ok(JobHandle::new(search_id, Utc::now()))
            }
            _ => Err(ClientError::transport(
                TransportKind::Decode,
                "response carried no search_id",
            )),
        }
    }

    async fn get_status(&self, handle: &JobHandle) -> Result<JobStatus, ClientError> {
        let url = self.endpoint(&["get_results", &handle.search_id])?;
        wikipath_debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotYetAvailable);
        }
        if !status.is_success() {
            return Err(ClientError::transport(
                TransportKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let body: StatusResponse = response.json().await.map_err(map_reqwest_error)?;
        Ok(body.into_status())
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<CancelAck, ClientError> {
        let url = self.endpoint(&["abort_search"])?;
        wikipath_debug!("POST {} search_id={}", url, handle.search_id);
        let response = self
            .client
            .post(url)
            .json(&CancelRequest {
                search_id: &handle.search_id,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        match status {
            _ if status.is_success() => Ok(CancelAck::Acknowledged),
            StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::GONE => {
                Ok(CancelAck::AlreadyFinished)
            }
            _ => {
                wikipath_warn!(
                    "cancel of search_id={} rejected with {}",
                    handle.search_id,
                    status
                );
                Err(ClientError::transport(
                    TransportKind::HttpStatus(status.as_u16()),
                    status.to_string(),
                ))
            }
        }
    }
}

pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Validation(format!("invalid server url: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::transport(TransportKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ClientError::transport(TransportKind::Decode, err.to_string());
    }
    ClientError::transport(TransportKind::Network, err.to_string())
}
