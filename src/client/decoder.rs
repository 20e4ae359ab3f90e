//! Incremental decoder for the relay's chat stream.
//!
//! The relay body is an optional JSON preamble (`{"model": "..."}`) followed,
//! with no separator, by raw completion text. Chunk boundaries are arbitrary:
//! they may split the preamble, or a multi-byte UTF-8 sequence, anywhere.
//!
//! ```text
//! AwaitingMetadata ──preamble closed / not a preamble──▶ StreamingContent
//!        │                                                    │
//!        └──────────────── finish() ──────────────────────────┴──▶ Done
//!  (any non-terminal state) ── fail() / abort() ──▶ Failed
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Upper bound on buffered preamble text before it is given up as content.
pub const MAX_PREAMBLE_BYTES: usize = 64 * 1024;

/// Metadata carried by the stream preamble.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamMetadata {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Metadata(StreamMetadata),
    Content(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingMetadata,
    StreamingContent,
    Done,
    Failed,
}

impl DecoderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// A non-success relay response, read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl RelayFailure {
    /// Human-readable text for the synthetic assistant increment.
    pub fn describe(&self) -> String {
        let detail = error_detail(&self.body);
        let head = if self.reason.is_empty() {
            format!("Error {}", self.status)
        } else {
            format!("Error {} {}", self.status, self.reason)
        };
        if detail.is_empty() {
            head
        } else {
            format!("{}: {}", head, detail)
        }
    }
}

/// Best-effort extraction of a reason from an error body.
fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let candidates = [
            value.get("error").and_then(Value::as_str),
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str),
            value.get("message").and_then(Value::as_str),
        ];
        if let Some(found) = candidates.into_iter().flatten().next() {
            return found.to_string();
        }
    }
    trimmed.to_string()
}

/// Carries incomplete UTF-8 sequences across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Truncated sequence at the end; wait for more bytes.
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

enum Scan {
    Incomplete,
    NotPreamble,
    /// Byte offset one past the closing brace.
    Closed(usize),
}

/// Finds the brace that closes the leading object, tracking JSON string literals.
#[derive(Debug, Default)]
struct PreambleScanner {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl PreambleScanner {
    fn scan(&mut self, buf: &str) -> Scan {
        for (offset, c) in buf[self.scanned..].char_indices() {
            let idx = self.scanned + offset;
            if idx == 0 && c != '{' {
                return Scan::NotPreamble;
            }
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Scan::Closed(idx + 1);
                    }
                }
                _ => {}
            }
        }
        self.scanned = buf.len();
        Scan::Incomplete
    }
}

/// Turns relay body chunks into [`DecodeEvent`]s.
///
/// Metadata parsing is attempted at most once per stream; whatever the outcome,
/// every byte after that point is content and is emitted exactly once.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    utf8: Utf8Carry,
    preamble: String,
    scanner: PreambleScanner,
    emitted_content: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitingMetadata,
            utf8: Utf8Carry::default(),
            preamble: String::new(),
            scanner: PreambleScanner::default(),
            emitted_content: false,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let text = self.utf8.decode(chunk);
        let mut events = Vec::new();

        match self.state {
            DecoderState::AwaitingMetadata => {
                self.preamble.push_str(&text);
                self.try_preamble(&mut events);
            }
            DecoderState::StreamingContent => self.emit_content(text, &mut events),
            DecoderState::Done | DecoderState::Failed => {}
        }
        events
    }

    /// End of data, or an explicit terminator from the transport.
    pub fn finish(&mut self) -> Vec<DecodeEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let mut events = Vec::new();
        let mut rest = std::mem::take(&mut self.preamble);
        rest.push_str(&self.utf8.flush());
        if self.state == DecoderState::AwaitingMetadata && !rest.is_empty() {
            debug!("Stream ended inside an unterminated preamble; keeping it as content");
        }
        self.emit_content(rest, &mut events);
        self.state = DecoderState::Done;
        events
    }

    /// Converts a non-success relay response into the single error increment.
    pub fn fail(&mut self, failure: &RelayFailure) -> Option<DecodeEvent> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = DecoderState::Failed;
        self.preamble.clear();
        Some(DecodeEvent::Content(failure.describe()))
    }

    /// Stops a stream that broke mid-flight. Buffered text is kept, then the
    /// error is appended as a final increment.
    pub fn abort(&mut self, reason: &str) -> Vec<DecodeEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let mut events = self.finish();
        let text = if self.emitted_content {
            format!("\n\nError: {}", reason)
        } else {
            format!("Error: {}", reason)
        };
        events.push(DecodeEvent::Content(text));
        self.state = DecoderState::Failed;
        events
    }

    fn try_preamble(&mut self, events: &mut Vec<DecodeEvent>) {
        match self.scanner.scan(&self.preamble) {
            Scan::Incomplete => {
                if self.preamble.len() > MAX_PREAMBLE_BYTES {
                    debug!(
                        buffered = self.preamble.len(),
                        "Preamble too long; treating it as content"
                    );
                    let buffered = std::mem::take(&mut self.preamble);
                    self.state = DecoderState::StreamingContent;
                    self.emit_content(buffered, events);
                }
            }
            Scan::NotPreamble => {
                let buffered = std::mem::take(&mut self.preamble);
                self.state = DecoderState::StreamingContent;
                self.emit_content(buffered, events);
            }
            Scan::Closed(end) => {
                let buffered = std::mem::take(&mut self.preamble);
                self.state = DecoderState::StreamingContent;
                match serde_json::from_str::<StreamMetadata>(&buffered[..end]) {
                    Ok(meta) => {
                        events.push(DecodeEvent::Metadata(meta));
                        self.emit_content(buffered[end..].to_string(), events);
                    }
                    Err(e) => {
                        debug!("Leading object is not stream metadata ({}); treating it as content", e);
                        self.emit_content(buffered, events);
                    }
                }
            }
        }
    }

    fn emit_content(&mut self, text: String, events: &mut Vec<DecodeEvent>) {
        if text.is_empty() {
            return;
        }
        self.emitted_content = true;
        events.push(DecodeEvent::Content(text));
    }
}
