use thiserror::Error;
use tracing::warn;

use crate::client::history::SendHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Idle,
    Sending,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposerError {
    #[error("A response is still streaming; wait for it to finish")]
    Busy,
    #[error("Nothing to send")]
    Empty,
}

/// Input side of the send pipeline: `Idle → Sending → Idle`.
///
/// At most one request is in flight; [`Composer::begin`] refuses a second one
/// until [`Composer::finish`] is called.
#[derive(Debug)]
pub struct Composer {
    state: ComposerState,
    history: SendHistory,
}

impl Composer {
    pub fn new(history: SendHistory) -> Self {
        Self {
            state: ComposerState::Idle,
            history,
        }
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == ComposerState::Sending
    }

    pub fn history(&self) -> &SendHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Entry at `index` of the send history (0 = most recent), for recall.
    pub fn recall(&self, index: usize) -> Option<&str> {
        self.history.get(index)
    }

    /// Enters `Sending` and records the text. Returns the text to dispatch.
    pub fn begin(&mut self, text: &str) -> Result<String, ComposerError> {
        if self.is_sending() {
            warn!("Rejected send while a response is streaming");
            return Err(ComposerError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ComposerError::Empty);
        }
        self.history.record(text);
        self.state = ComposerState::Sending;
        Ok(text.to_string())
    }

    pub fn finish(&mut self) {
        self.state = ComposerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_send_rejected_while_sending() {
        let mut composer = Composer::new(SendHistory::new());
        assert_eq!(composer.begin("first").unwrap(), "first");
        assert_eq!(composer.begin("second"), Err(ComposerError::Busy));
        assert_eq!(composer.history().len(), 1);

        composer.finish();
        assert_eq!(composer.state(), ComposerState::Idle);
        assert!(composer.begin("second").is_ok());
        assert_eq!(composer.recall(0), Some("second"));
    }

    #[test]
    fn test_blank_input_keeps_idle() {
        let mut composer = Composer::new(SendHistory::new());
        assert_eq!(composer.begin("  "), Err(ComposerError::Empty));
        assert_eq!(composer.state(), ComposerState::Idle);
    }
}
