pub mod anthropic;
pub mod models;
pub mod ollama;
pub mod openai;
pub mod sse;

use anthropic::AnthropicProvider;
use ollama::OllamaProvider;
use openai::OpenAiProvider;

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use models::{ChatOptions, Message};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("Rate Limited")]
    RateLimited,
}

impl LlmError {
    /// Status the relay answers with when this error happens before streaming.
    pub fn http_status(&self) -> u16 {
        match self {
            LlmError::Network(_) => 502,
            LlmError::Api { status, .. } => *status,
            LlmError::InvalidRequest(_) => 400,
            LlmError::RateLimited => 429,
        }
    }
}

/// Completion text as it arrives from the provider.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model a request with these options will run against.
    fn resolve_model(&self, options: &ChatOptions) -> String;

    /// Whether a request without its own key can still be served.
    fn has_default_key(&self) -> bool;

    /// Starts a streaming completion. Returns once the upstream accepted the
    /// request, so failures are reported before any text.
    async fn chat_streaming(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<TextStream, LlmError>;
}

/// Builds the provider named by `llm.provider`.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Option<Arc<dyn LlmProvider>> {
        let provider_name = config.llm.provider.as_str();

        match provider_name {
            "openai" => {
                let cfg = config.llm.openai.as_ref()?;
                Some(Arc::new(OpenAiProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "anthropic" => {
                let cfg = config.llm.anthropic.as_ref()?;
                Some(Arc::new(AnthropicProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "ollama" => {
                let cfg = config.llm.ollama.as_ref()?;
                Some(Arc::new(OllamaProvider::new(
                    cfg.base_url.clone(),
                    cfg.default_model.clone(),
                )))
            }
            _ => None,
        }
    }
}

/// Picks the request key over the configured one; blank keys count as missing.
pub(crate) fn effective_key<'a>(options: &'a ChatOptions, configured: &'a str) -> Option<&'a str> {
    options
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .or(Some(configured).filter(|k| !k.trim().is_empty()))
}

pub(crate) async fn upstream_error(response: reqwest::Response, provider: &str) -> LlmError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited;
    }
    LlmError::Api {
        status: status.as_u16(),
        message: format!("{} stream error: {}", provider, text.trim()),
    }
}
