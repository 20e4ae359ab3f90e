use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tracing::debug;

pub use crate::api::models::{ChatRequest, WireMessage};
use crate::client::decoder::RelayFailure;
use crate::client::ClientError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// What the relay answered once response headers arrived.
pub enum RelayResponse {
    Stream(ByteStream),
    Failed(RelayFailure),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issues the request and waits for the response status.
    async fn open(&self, request: &ChatRequest) -> Result<RelayResponse, ClientError>;
}

/// Talks to a `prattle serve` relay over HTTP.
pub struct HttpRelay {
    client: Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpRelay {
    async fn open(&self, request: &ChatRequest) -> Result<RelayResponse, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(url = %url, messages = request.messages.len(), "Opening relay stream");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(RelayResponse::Failed(RelayFailure {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            }));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::Transport(e.to_string())));
        Ok(RelayResponse::Stream(Box::pin(stream)))
    }
}
