//! Blocking HTTP client for the inference service.
//!
//! Calls are made from worker threads, never from the UI thread.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use thiserror::Error;
use tracing::debug;

use crate::error::SessionError;
use crate::protocol::{DeviceRequest, Reply};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered with HTTP {0}")]
    Status(u16),
    #[error("undecodable reply: {0}")]
    Decode(String),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Decode(detail) => SessionError::MalformedResponse(detail),
            other => SessionError::Transport(other.to_string()),
        }
    }
}

/// The remote endpoints the client relies on
pub trait InferenceApi: Send + Sync + 'static {
    /// `GET /`, the service's usage banner
    fn usage(&self) -> Result<Reply, ApiError>;
    /// `GET /devices`
    fn devices(&self) -> Result<Reply, ApiError>;
    /// `POST /scan`
    fn scan(&self, request: &DeviceRequest) -> Result<Reply, ApiError>;
    /// `POST /predict_start`
    fn predict_start(&self, request: &DeviceRequest) -> Result<Reply, ApiError>;
    /// `GET /predict_get`, used both for readiness and for samples
    fn predict_get(&self) -> Result<Reply, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpInferenceApi {
    client: Client,
    base_url: String,
}

impl HttpInferenceApi {
    /// Only the connect phase is bounded; the readiness poll is a long-poll.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> Result<Reply, ApiError> {
        debug!(path, "GET");
        decode(self.client.get(self.url(path)).send()?)
    }

    fn post(&self, path: &str, body: &DeviceRequest) -> Result<Reply, ApiError> {
        debug!(path, devices = body.dev_list.len(), pos = %body.pos, "POST");
        decode(self.client.post(self.url(path)).json(body).send()?)
    }
}

fn decode(response: Response) -> Result<Reply, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

impl InferenceApi for HttpInferenceApi {
    fn usage(&self) -> Result<Reply, ApiError> {
        self.get("/")
    }

    fn devices(&self) -> Result<Reply, ApiError> {
        self.get("/devices")
    }

    fn scan(&self, request: &DeviceRequest) -> Result<Reply, ApiError> {
        self.post("/scan", request)
    }

    fn predict_start(&self, request: &DeviceRequest) -> Result<Reply, ApiError> {
        self.post("/predict_start", request)
    }

    fn predict_get(&self) -> Result<Reply, ApiError> {
        self.get("/predict_get")
    }
}
