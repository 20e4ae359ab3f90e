//! The relay: HTTP endpoints the chat client talks to.

pub mod models;
pub mod routes;
pub mod transcribe;

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::llm::LlmProvider;
use transcribe::{TranscriptionUpstream, MAX_AUDIO_BYTES};

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

/// Registers shared state and every relay route on an `App`.
pub fn configure_app(
    llm: Arc<dyn LlmProvider>,
    transcription: TranscriptionUpstream,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(llm))
            .app_data(web::Data::new(transcription))
            .app_data(web::PayloadConfig::new(MAX_AUDIO_BYTES))
            .route("/health", web::get().to(health))
            .configure(routes::configure);
    }
}
