#[cfg(test)]
mod tests {
    use actix_web::{web, App, HttpResponse, HttpServer};
    use futures_util::{stream, StreamExt};

    use prattle::llm::anthropic::AnthropicProvider;
    use prattle::llm::models::{ChatOptions, Message};
    use prattle::llm::ollama::OllamaProvider;
    use prattle::llm::openai::OpenAiProvider;
    use prattle::llm::{LlmError, LlmProvider, TextStream};

    /// Starts a throwaway upstream on a free port and returns its base URL.
    fn spawn_upstream(routes: fn(&mut web::ServiceConfig)) -> String {
        let server = HttpServer::new(move || App::new().configure(routes))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    /// Body split mid-line, the way a proxy may chunk it.
    fn chunked(chunks: &'static [&'static str], content_type: &str) -> HttpResponse {
        let body = stream::iter(
            chunks
                .iter()
                .map(|c| Ok::<_, actix_web::Error>(web::Bytes::from_static(c.as_bytes()))),
        );
        HttpResponse::Ok().content_type(content_type).streaming(body)
    }

    async fn openai_completions() -> HttpResponse {
        chunked(
            &[
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\ndata: {\"choices\":[{\"del",
                "ta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\r\n\r\n",
                "data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" after\"}}]}\n\n",
            ],
            "text/event-stream",
        )
    }

    async fn anthropic_messages() -> HttpResponse {
        chunked(
            &[
                "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
                "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi",
                " there\"}}\n\nevent: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n\n",
            ],
            "text/event-stream",
        )
    }

    async fn ollama_chat() -> HttpResponse {
        chunked(
            &[
                "{\"message\":{\"role\":\"assistant\",\"content\":\"Yo\"},\"done\":false}\n{\"message\":",
                "{\"role\":\"assistant\",\"content\":\"!\"},\"done\":true}\n",
                "{\"message\":{\"role\":\"assistant\",\"content\":\"ignored\"},\"done\":false}\n",
            ],
            "application/x-ndjson",
        )
    }

    async fn overloaded() -> HttpResponse {
        HttpResponse::ServiceUnavailable().body("{\"error\":\"overloaded\"}")
    }

    fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/chat/completions", web::post().to(openai_completions))
            .route("/v1/messages", web::post().to(anthropic_messages))
            .route("/api/chat", web::post().to(ollama_chat))
            .route("/busy/chat/completions", web::post().to(overloaded));
    }

    fn options() -> ChatOptions {
        ChatOptions {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    async fn collect(stream: TextStream) -> String {
        let parts: Vec<String> = stream.map(|item| item.unwrap()).collect().await;
        parts.concat()
    }

    #[actix_web::test]
    async fn test_openai_stops_at_done() {
        let base = spawn_upstream(routes);
        let provider = OpenAiProvider::new(String::new(), base, "gpt-3.5-turbo".to_string());

        let stream = provider
            .chat_streaming(&[Message::new("user", "hi")], options())
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "Hello");
    }

    #[actix_web::test]
    async fn test_anthropic_stops_at_message_stop() {
        let base = spawn_upstream(routes);
        let provider = AnthropicProvider::new(String::new(), base, "claude-3-haiku".to_string());

        let stream = provider
            .chat_streaming(&[Message::new("user", "hi")], options())
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "Hi there");
    }

    #[actix_web::test]
    async fn test_ollama_stops_at_done_flag() {
        let base = spawn_upstream(routes);
        let provider = OllamaProvider::new(base, "llama3".to_string());

        let stream = provider
            .chat_streaming(&[Message::new("user", "hi")], ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "Yo!");
    }

    #[actix_web::test]
    async fn test_rejection_reported_before_streaming() {
        let base = spawn_upstream(routes);
        let provider = OpenAiProvider::new(String::new(), format!("{}/busy", base), "gpt-3.5-turbo".to_string());

        let err = match provider.chat_streaming(&[Message::new("user", "hi")], options()).await {
            Ok(_) => panic!("expected the upstream rejection"),
            Err(e) => e,
        };
        assert_eq!(err.http_status(), 503);
        assert!(matches!(err, LlmError::Api { ref message, .. } if message.contains("overloaded")));
    }
}
