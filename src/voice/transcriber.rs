use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use tracing::{debug, info};

use crate::api::models::TranscriptionResponse;
use crate::voice::{audio_level, DictationSink, VoiceCapture, VoiceError};

/// Span of audio summarised by one level reading.
pub const LEVEL_WINDOW: Duration = Duration::from_millis(100);

/// Container of a recording as uploaded to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Webm,
    Wav,
}

impl AudioFormat {
    /// Picks the format from the file extension; anything but `.wav` is webm.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wav") => AudioFormat::Wav,
            _ => AudioFormat::Webm,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            AudioFormat::Webm => "audio.webm",
            AudioFormat::Wav => "audio.wav",
        }
    }

    fn mime(self) -> &'static str {
        match self {
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

/// Level readings for consecutive windows of a WAV recording, mixed to mono.
pub fn wav_levels(audio: &[u8], window: Duration) -> Result<Vec<f32>, VoiceError> {
    let mut reader = hound::WavReader::new(Cursor::new(audio))
        .map_err(|e| VoiceError::Capture(format!("unreadable WAV: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<f32>, hound::Error>>()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, hound::Error>>(),
    }
    .map_err(|e| VoiceError::Capture(format!("WAV read error: {e}")))?;

    let channels = spec.channels.max(1) as usize;
    let mono: Vec<f32> = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    let per_window = ((spec.sample_rate as f64 * window.as_secs_f64()) as usize).max(1);
    Ok(mono.chunks(per_window).map(audio_level).collect())
}

/// Client for the relay's `/api/transcribe` endpoint.
#[derive(Clone)]
pub struct RelayTranscriber {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl RelayTranscriber {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    /// Uploads one recording and returns its text.
    pub async fn transcribe(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String, VoiceError> {
        let part = multipart::Part::bytes(audio)
            .file_name(format.file_name())
            .mime_str(format.mime())
            .map_err(|e| VoiceError::Transport(e.to_string()))?;
        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let mut request = self
            .client
            .post(format!("{}/api/transcribe", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(VoiceError::Transport(format!(
                "relay returned {}",
                response.status()
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Transport(e.to_string()))?;
        Ok(body.text)
    }
}

/// Capture backend that "records" by reading an audio file from disk.
/// WAV files also drive the level meter; webm is uploaded as is.
pub struct AudioFileCapture {
    transcriber: RelayTranscriber,
    path: PathBuf,
}

impl AudioFileCapture {
    pub fn new(transcriber: RelayTranscriber, path: impl Into<PathBuf>) -> Self {
        Self {
            transcriber,
            path: path.into(),
        }
    }
}

#[async_trait]
impl VoiceCapture for AudioFileCapture {
    async fn capture(&self, sink: &mut dyn DictationSink) -> Result<String, VoiceError> {
        let audio = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => VoiceError::PermissionDenied,
            _ => VoiceError::Capture(format!("{}: {}", self.path.display(), e)),
        })?;
        let format = AudioFormat::from_path(&self.path);
        if format == AudioFormat::Wav {
            let levels = wav_levels(&audio, LEVEL_WINDOW)?;
            debug!(windows = levels.len(), "Replaying recording levels");
            for level in levels {
                sink.on_level(level);
            }
        }
        info!(bytes = audio.len(), path = %self.path.display(), "Uploading recording");

        let text = self.transcriber.transcribe(audio, format).await?;
        sink.on_transcript(&text);
        Ok(text)
    }
}
