#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use futures_util::stream;

    use prattle::api::{self, models::ChatRequest, models::WireMessage, transcribe::TranscriptionUpstream};
    use prattle::llm::models::{ChatOptions, Message};
    use prattle::llm::{LlmError, LlmProvider, TextStream};

    /// Answers every request with fixed chunks, or fails before streaming.
    struct FakeProvider {
        chunks: Vec<&'static str>,
        reject: Option<u16>,
        default_key: bool,
        seen: Mutex<Vec<(Vec<Message>, Option<String>)>>,
    }

    impl FakeProvider {
        fn replying(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                reject: None,
                default_key: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn resolve_model(&self, options: &ChatOptions) -> String {
            options.model.clone().unwrap_or_else(|| "fake-default".to_string())
        }

        fn has_default_key(&self) -> bool {
            self.default_key
        }

        async fn chat_streaming(
            &self,
            messages: &[Message],
            options: ChatOptions,
        ) -> Result<TextStream, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.api_key.clone()));
            if let Some(status) = self.reject {
                return Err(LlmError::Api {
                    status,
                    message: "overloaded".to_string(),
                });
            }
            let items: Vec<Result<String, LlmError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn upstream() -> TranscriptionUpstream {
        TranscriptionUpstream::new("http://127.0.0.1:9", "")
    }

    fn hi_request(api_key: Option<&str>) -> ChatRequest {
        ChatRequest {
            api_key: api_key.map(str::to_string),
            messages: vec![WireMessage {
                role: "user".to_string(),
                text: "hi".to_string(),
            }],
            model: Some("gpt-4".to_string()),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn test_health() {
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeProvider::replying(vec![]));
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_chat_streams_preamble_then_text() {
        let provider = Arc::new(FakeProvider::replying(vec!["Hel", "lo"]));
        let llm: Arc<dyn LlmProvider> = provider.clone();
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(hi_request(Some("sk-test")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), b"{\"model\":\"gpt-4\"}Hello");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, vec![Message::new("user", "hi")]);
        assert_eq!(seen[0].1.as_deref(), Some("sk-test"));
    }

    #[actix_web::test]
    async fn test_chat_without_key_is_rejected() {
        let provider = Arc::new(FakeProvider::replying(vec!["never"]));
        let llm: Arc<dyn LlmProvider> = provider.clone();
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(hi_request(Some("  ")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), b"Missing API key");
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_configured_key_allows_keyless_request() {
        let provider = FakeProvider {
            default_key: true,
            ..FakeProvider::replying(vec!["ok"])
        };
        let llm: Arc<dyn LlmProvider> = Arc::new(provider);
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(hi_request(None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_upstream_rejection_keeps_status() {
        let provider = FakeProvider {
            reject: Some(503),
            ..FakeProvider::replying(vec![])
        };
        let llm: Arc<dyn LlmProvider> = Arc::new(provider);
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(hi_request(Some("sk-test")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("overloaded"));
    }

    #[actix_web::test]
    async fn test_unknown_role_is_rejected() {
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeProvider::replying(vec![]));
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let mut request = hi_request(Some("sk-test"));
        request.messages[0].role = "tool".to_string();
        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_transcribe_requires_multipart() {
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeProvider::replying(vec![]));
        let app = test::init_service(App::new().configure(api::configure_app(llm, upstream()))).await;

        let req = test::TestRequest::post()
            .uri("/api/transcribe")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
