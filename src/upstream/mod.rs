mod payload;

pub use payload::{ChatMessage, Role, UpstreamPayload};

use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::RelayConfig;

/// Raw body chunks of a streaming upstream response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMode {
    /// Wait for the whole body and extract the completion text.
    Aggregate,
    /// Hand the live body back to the caller.
    Stream,
}

pub enum UpstreamResponse {
    Completion(String),
    Stream(ByteStream),
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamResponse::Completion(text) => f.debug_tuple("Completion").field(text).finish(),
            UpstreamResponse::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("API error: {0}")]
    HttpStatus(u16),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream response did not contain a completion")]
    MalformedResponse,

    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if let Some(status) = e.status() {
            UpstreamError::HttpStatus(status.as_u16())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// Connection to an OpenAI-compatible `chat/completions` endpoint.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        payload: &UpstreamPayload,
        config: &RelayConfig,
        mode: UpstreamMode,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// reqwest-backed upstream client. The timeout covers the whole call, from
/// connect until the last body byte.
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        info!("Upstream time budget: {}s", timeout.as_secs_f64());

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build upstream HTTP client")?;

        Ok(Self { client })
    }

    fn request(&self, payload: &UpstreamPayload, config: &RelayConfig) -> RequestBuilder {
        let mut request = self
            .client
            .post(config.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(payload);

        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        request
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn send(
        &self,
        payload: &UpstreamPayload,
        config: &RelayConfig,
        mode: UpstreamMode,
    ) -> Result<UpstreamResponse, UpstreamError> {
        debug!("POST {} (model: {}, mode: {:?})", config.endpoint, payload.model, mode);

        let response = self.request(payload, config).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::HttpStatus(status.as_u16()));
        }

        match mode {
            UpstreamMode::Aggregate => {
                let body: Value = response.json().await.map_err(|e| {
                    if e.is_timeout() {
                        UpstreamError::Timeout
                    } else if e.is_decode() {
                        UpstreamError::MalformedResponse
                    } else {
                        UpstreamError::from(e)
                    }
                })?;
                extract_completion(&body).map(UpstreamResponse::Completion)
            }
            UpstreamMode::Stream => {
                let chunks = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(UpstreamError::from));
                Ok(UpstreamResponse::Stream(Box::pin(chunks)))
            }
        }
    }
}

/// Pull `choices[0].message.content` out of a completion object.
pub fn extract_completion(body: &Value) -> Result<String, UpstreamError> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|content| content.to_string())
        .ok_or(UpstreamError::MalformedResponse)
}
