use actix_web::{http::header, post, web, HttpRequest, HttpResponse};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::api::models::{ErrorBody, TranscriptionResponse};
use crate::config::{expand_env, AppConfig};

/// Largest audio upload the relay accepts.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// OpenAI-compatible `/audio/transcriptions` endpoint the relay forwards to.
#[derive(Clone)]
pub struct TranscriptionUpstream {
    client: Client,
    api_base: String,
    api_key: String,
}

impl TranscriptionUpstream {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        // Without an openai section the defaults still carry an unexpanded placeholder.
        let openai = config.llm.openai.clone().unwrap_or_default();
        Self::new(openai.api_base, expand_env(&openai.api_key))
    }
}

fn bad_gateway(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadGateway().json(ErrorBody {
        error: message.into(),
    })
}

/// Forwards a multipart audio upload (file + model fields) untouched and
/// returns the recognised text.
#[post("/transcribe")]
pub async fn transcribe(
    upstream: web::Data<TranscriptionUpstream>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let content_type = match req.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(ct) if ct.starts_with("multipart/form-data") => ct.to_string(),
        _ => {
            return HttpResponse::BadRequest()
                .content_type("text/plain; charset=utf-8")
                .body("Expected multipart/form-data");
        }
    };

    let api_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(upstream.api_key.as_str())
        .to_string();

    if api_key.is_empty() {
        warn!("Rejecting transcription without an API key");
        return HttpResponse::BadRequest()
            .content_type("text/plain; charset=utf-8")
            .body("Missing API key");
    }

    info!(bytes = body.len(), "Forwarding audio for transcription");

    let response = match upstream
        .client
        .post(format!("{}/audio/transcriptions", upstream.api_base))
        .bearer_auth(api_key)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(body.to_vec())
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            error!("Transcription request failed: {}", e);
            return bad_gateway(format!("Transcription request failed: {}", e));
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        error!("Transcription upstream returned {}: {}", status, text);
        return bad_gateway(format!("Transcription failed with status {}", status.as_u16()));
    }

    match response.json::<TranscriptionResponse>().await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => {
            error!("Unreadable transcription response: {}", e);
            bad_gateway("Unreadable transcription response")
        }
    }
}
