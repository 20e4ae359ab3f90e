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

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
        }
    }
}

/// Interprets one line of an OpenAI-style SSE body.
pub fn parse_line(line: &str) -> StreamLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(json) => match json["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => StreamLine::Text(content.to_string()),
            _ => StreamLine::Skip,
        },
        Err(_) => StreamLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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

        let mut final_messages: Vec<Message> = messages.to_vec();
        if let Some(system) = &options.system_prompt {
            final_messages.insert(0, Message::new("system", system.clone()));
        }

        let body = json!({
            "model": model,
            "messages": final_messages,
            "stream": true,
            "temperature": options.temperature.unwrap_or(0.7),
            "max_tokens": options.max_tokens.unwrap_or(4096),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response, "OpenAI").await);
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
