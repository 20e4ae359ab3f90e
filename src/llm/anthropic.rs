use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

use crate::llm::{
    effective_key,
    models::{ChatOptions, Message},
    sse::{LineBuffer, StreamLine},
    upstream_error, LlmError, LlmProvider, TextStream,
};

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
        }
    }
}

/// Interprets one line of an Anthropic messages SSE body.
pub fn parse_line(line: &str) -> StreamLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data.trim_start()) else {
        return StreamLine::Skip;
    };
    // Anthropic streams delta objects differently than OpenAI
    match json["type"].as_str() {
        Some("content_block_delta") => match json["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => StreamLine::Text(text.to_string()),
            _ => StreamLine::Skip,
        },
        Some("message_stop") => StreamLine::Done,
        _ => StreamLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn resolve_model(&self, options: &ChatOptions) -> String {
        options
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn has_default_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<TextStream, LlmError> {
        let model = self.resolve_model(&options);
        let api_key = effective_key(&options, &self.api_key)
            .ok_or_else(|| LlmError::InvalidRequest("Missing API key".to_string()))?;

        // Anthropic requires the 'system' prompt as a separate field
        let mut system = String::new();
        let filtered_messages: Vec<Message> = messages
            .iter()
            .filter_map(|m| {
                if m.role == "system" {
                    system.push_str(&m.content);
                    system.push('\n');
                    None
                } else {
                    Some(m.clone())
                }
            })
            .collect();

        if let Some(opts_system) = &options.system_prompt {
            system.push_str(opts_system);
        }

        let body = json!({
            "model": model,
            "messages": filtered_messages,
            "system": system.trim(),
            "stream": true,
            "temperature": options.temperature.unwrap_or(0.7),
            "max_tokens": options.max_tokens.unwrap_or(4096),
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response, "Anthropic").await);
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(LlmError::Network(e.to_string()));
                        break;
                    }
                };
                for line in lines.push(&chunk) {
                    match parse_line(&line) {
                        StreamLine::Text(text) => yield Ok(text),
                        StreamLine::Done => break 'read,
                        StreamLine::Skip => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
