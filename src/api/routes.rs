use actix_web::{http::StatusCode, post, web, HttpResponse};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::models::{ChatRequest, ErrorBody, StreamPreamble};
use crate::llm::{
    models::{ChatOptions, Message as LlmMessage},
    LlmProvider,
};

const KNOWN_ROLES: [&str; 3] = ["system", "user", "assistant"];

fn plain_error(status: StatusCode, text: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/plain; charset=utf-8")
        .body(text.to_string())
}

/// Relays a chat history upstream and streams the reply back as
/// `{"model": ...}` followed by raw completion text.
#[post("/chat")]
pub async fn chat(
    llm: web::Data<Arc<dyn LlmProvider>>,
    req: web::Json<ChatRequest>,
) -> HttpResponse {
    let req = req.into_inner();

    let api_key = req.api_key.filter(|k| !k.trim().is_empty());
    if api_key.is_none() && !llm.has_default_key() {
        warn!("Rejecting chat request without an API key");
        return plain_error(StatusCode::BAD_REQUEST, "Missing API key");
    }

    if req.messages.is_empty() {
        return plain_error(StatusCode::BAD_REQUEST, "No messages to send");
    }

    let mut llm_messages = Vec::with_capacity(req.messages.len());
    for m in req.messages {
        if !KNOWN_ROLES.contains(&m.role.as_str()) {
            return plain_error(StatusCode::BAD_REQUEST, &format!("Unknown role: {}", m.role));
        }
        llm_messages.push(LlmMessage::new(m.role, m.text));
    }

    let chat_options = ChatOptions {
        model: req.model,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        system_prompt: None,
        api_key,
    };
    let model = llm.resolve_model(&chat_options);

    info!(
        provider = llm.name(),
        model = %model,
        messages = llm_messages.len(),
        "Relaying chat request"
    );

    let mut upstream = match llm.chat_streaming(&llm_messages, chat_options).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Upstream rejected chat request: {}", e);
            let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
            return HttpResponse::build(status).json(ErrorBody {
                error: e.to_string(),
            });
        }
    };

    let preamble = match serde_json::to_string(&StreamPreamble { model }) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to encode stream preamble: {}", e);
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode preamble");
        }
    };

    let body = async_stream::stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from(preamble));

        let mut chunks = 0usize;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(text) => {
                    chunks += 1;
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(text));
                }
                Err(e) => {
                    error!("Upstream stream failed mid-response: {}", e);
                    break;
                }
            }
        }
        info!(chunks, "Relay stream finished");
    };

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(chat)
            .service(crate::api::transcribe::transcribe),
    );
}
