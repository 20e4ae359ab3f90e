//! Dictation as an opaque capability.
//!
//! A [`VoiceCapture`] produces live transcript updates and audio levels and
//! finally a transcript. [`Dictation`] adds the start delay, user dismissal and
//! the "permission errors are not fatal" rule on top of any capture backend.

pub mod transcriber;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

pub use transcriber::{AudioFileCapture, AudioFormat, RelayTranscriber};

/// Pause between the dictation request and the start of capture.
pub const START_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Transcription failed: {0}")]
    Transport(String),
}

/// Receives progress while a capture runs.
pub trait DictationSink: Send {
    fn on_transcript(&mut self, partial: &str);
    fn on_level(&mut self, level: f32);
}

#[async_trait]
pub trait VoiceCapture: Send + Sync {
    /// Runs until end of speech and returns the final transcript.
    async fn capture(&self, sink: &mut dyn DictationSink) -> Result<String, VoiceError>;
}

/// Root-mean-square level of a block of samples, clamped to `[0, 1]`.
pub fn audio_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt().clamp(0.0, 1.0)
}

struct TranscriptTracker<'a> {
    inner: &'a mut dyn DictationSink,
    last: String,
}

impl DictationSink for TranscriptTracker<'_> {
    fn on_transcript(&mut self, partial: &str) {
        self.last = partial.to_string();
        self.inner.on_transcript(partial);
    }

    fn on_level(&mut self, level: f32) {
        self.inner.on_level(level);
    }
}

enum Outcome {
    Finished(Result<String, VoiceError>),
    Dismissed,
}

pub struct Dictation {
    start_delay: Duration,
}

impl Default for Dictation {
    fn default() -> Self {
        Self {
            start_delay: START_DELAY,
        }
    }
}

impl Dictation {
    pub fn with_delay(start_delay: Duration) -> Self {
        Self { start_delay }
    }

    /// Runs one dictation. Returns the transcript for the composer, or `None`
    /// if nothing usable was captured. Dismissal keeps the latest partial.
    pub async fn run(
        &self,
        capture: &dyn VoiceCapture,
        sink: &mut dyn DictationSink,
        dismiss: oneshot::Receiver<()>,
    ) -> Option<String> {
        let mut tracker = TranscriptTracker {
            inner: sink,
            last: String::new(),
        };
        // A dropped sender means the caller cannot dismiss; keep waiting on capture.
        let dismissed = async move {
            if dismiss.await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(dismissed);

        tokio::select! {
            _ = tokio::time::sleep(self.start_delay) => {}
            _ = &mut dismissed => {
                info!("Dictation dismissed before capture started");
                return None;
            }
        }

        let outcome = tokio::select! {
            result = capture.capture(&mut tracker) => Outcome::Finished(result),
            _ = &mut dismissed => Outcome::Dismissed,
        };

        let transcript = match outcome {
            Outcome::Finished(Ok(text)) => text,
            Outcome::Finished(Err(VoiceError::PermissionDenied)) => {
                warn!("Microphone permission denied; dictation not started");
                return None;
            }
            Outcome::Finished(Err(e)) => {
                warn!("Dictation failed: {}", e);
                return None;
            }
            Outcome::Dismissed => {
                info!("Dictation dismissed");
                tracker.last
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            None
        } else {
            Some(transcript.to_string())
        }
    }
}
