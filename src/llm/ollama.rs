use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

use crate::llm::{
    models::{ChatOptions, Message},
    sse::{LineBuffer, StreamLine},
    upstream_error, LlmError, LlmProvider, TextStream,
};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
        }
    }
}

/// Ollama streams newline-delimited JSON objects; `done: true` ends the reply.
/// The final object may still carry text, so both are reported.
pub fn parse_line(line: &str) -> Vec<StreamLine> {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
        return vec![StreamLine::Skip];
    };
    let mut out = Vec::new();
    if let Some(content) = json["message"]["content"].as_str() {
        if !content.is_empty() {
            out.push(StreamLine::Text(content.to_string()));
        }
    }
    if json["done"].as_bool() == Some(true) {
        out.push(StreamLine::Done);
    }
    out
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn resolve_model(&self, options: &ChatOptions) -> String {
        options
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn has_default_key(&self) -> bool {
        // A local Ollama server needs no key.
        true
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<TextStream, LlmError> {
        let model = self.resolve_model(&options);

        let mut final_messages: Vec<Message> = messages.to_vec();
        if let Some(system) = &options.system_prompt {
            final_messages.insert(0, Message::new("system", system.clone()));
        }

        let body = json!({
            "model": model,
            "messages": final_messages,
            "stream": true,
            "options": {
                "temperature": options.temperature.unwrap_or(0.7),
                "num_predict": options.max_tokens.unwrap_or(4096)
            }
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response, "Ollama").await);
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
                    for parsed in parse_line(&line) {
                        match parsed {
                            StreamLine::Text(text) => yield Ok(text),
                            StreamLine::Done => break 'read,
                            StreamLine::Skip => {}
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_object_text_and_done() {
        let parsed = parse_line(r#"{"message":{"role":"assistant","content":"!"},"done":true}"#);
        assert_eq!(parsed, vec![StreamLine::Text("!".to_string()), StreamLine::Done]);
    }
}
