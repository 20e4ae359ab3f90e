#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, web, App, HttpRequest, HttpResponse, HttpServer};

    use prattle::api::{self, transcribe::TranscriptionUpstream};
    use prattle::llm::ollama::OllamaProvider;
    use prattle::llm::LlmProvider;
    use prattle::voice::{AudioFileCapture, AudioFormat, DictationSink, RelayTranscriber, VoiceCapture};

    /// Echoes what reached it as the transcript: `auth|content-type|fields`.
    async fn echo_transcription(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let body = String::from_utf8_lossy(&body);
        let fields = if body.contains("name=\"model\"") && body.contains("name=\"file\"") {
            "fields"
        } else {
            "missing"
        };
        HttpResponse::Ok().json(serde_json::json!({
            "text": format!("{}|{}|{}", header("authorization"), header("content-type"), fields)
        }))
    }

    async fn broken_transcription() -> HttpResponse {
        HttpResponse::InternalServerError().body("model exploded")
    }

    fn upstream_routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/ok/audio/transcriptions", web::post().to(echo_transcription))
            .route("/broken/audio/transcriptions", web::post().to(broken_transcription));
    }

    fn spawn_upstream() -> String {
        let server = HttpServer::new(|| App::new().configure(upstream_routes))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    fn unused_llm() -> Arc<dyn LlmProvider> {
        Arc::new(OllamaProvider::new("http://127.0.0.1:9".to_string(), "llama3".to_string()))
    }

    /// Runs a real relay in front of `transcription` and returns its base URL.
    fn spawn_relay(transcription: TranscriptionUpstream) -> String {
        let llm = unused_llm();
        let server = HttpServer::new(move || {
            App::new().configure(api::configure_app(llm.clone(), transcription.clone()))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    const BOUNDARY: &str = "prattle-test-boundary";

    fn multipart_body() -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-1\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"audio.webm\"\r\n\
             Content-Type: audio/webm\r\n\r\nfake-audio\r\n--{b}--\r\n",
            b = BOUNDARY
        )
    }

    fn wav_bytes() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..300 {
            writer.write_sample(if i < 100 { 0i16 } else { 8000 }).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[derive(Default)]
    struct RecordingSink {
        partials: Vec<String>,
        levels: Vec<f32>,
    }

    impl DictationSink for RecordingSink {
        fn on_transcript(&mut self, partial: &str) {
            self.partials.push(partial.to_string());
        }

        fn on_level(&mut self, level: f32) {
            self.levels.push(level);
        }
    }

    #[actix_web::test]
    async fn test_multipart_forwarded_with_content_type() {
        let base = spawn_upstream();
        let transcription = TranscriptionUpstream::new(format!("{}/ok", base), "sk-config");
        let app = test::init_service(App::new().configure(api::configure_app(unused_llm(), transcription))).await;

        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        let req = test::TestRequest::post()
            .uri("/api/transcribe")
            .insert_header(("Content-Type", content_type.as_str()))
            .set_payload(multipart_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["text"],
            format!("Bearer sk-config|{}|fields", content_type)
        );
    }

    #[actix_web::test]
    async fn test_upstream_failure_maps_to_bad_gateway() {
        let base = spawn_upstream();
        let transcription = TranscriptionUpstream::new(format!("{}/broken", base), "sk-config");
        let app = test::init_service(App::new().configure(api::configure_app(unused_llm(), transcription))).await;

        let req = test::TestRequest::post()
            .uri("/api/transcribe")
            .insert_header(("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("500"));
    }

    #[actix_web::test]
    async fn test_missing_key_everywhere_is_rejected() {
        let base = spawn_upstream();
        let transcription = TranscriptionUpstream::new(format!("{}/ok", base), "");
        let app = test::init_service(App::new().configure(api::configure_app(unused_llm(), transcription))).await;

        let req = test::TestRequest::post()
            .uri("/api/transcribe")
            .insert_header(("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_client_key_overrides_relay_key() {
        let base = spawn_upstream();
        let relay = spawn_relay(TranscriptionUpstream::new(format!("{}/ok", base), "sk-config"));

        let transcriber = RelayTranscriber::new(relay, "whisper-1", Some("sk-user".to_string()));
        let text = transcriber.transcribe(wav_bytes(), AudioFormat::Wav).await.unwrap();

        let (auth, rest) = text.split_once('|').unwrap();
        assert_eq!(auth, "Bearer sk-user");
        assert!(rest.starts_with("multipart/form-data; boundary="));
        assert!(rest.ends_with("|fields"));
    }

    #[actix_web::test]
    async fn test_wav_recording_drives_meter_and_transcript() {
        let base = spawn_upstream();
        let relay = spawn_relay(TranscriptionUpstream::new(format!("{}/ok", base), "sk-config"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        std::fs::write(&path, wav_bytes()).unwrap();

        let capture = AudioFileCapture::new(RelayTranscriber::new(relay, "whisper-1", None), &path);
        let mut sink = RecordingSink::default();
        let text = capture.capture(&mut sink).await.unwrap();

        assert!(text.starts_with("Bearer sk-config|"));
        assert_eq!(sink.partials, vec![text]);
        assert_eq!(sink.levels.len(), 3);
        assert_eq!(sink.levels[0], 0.0);
        assert!(sink.levels[1] > 0.2);
    }
}
