use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const HISTORY_LIMIT: usize = 20;

/// Previously sent inputs, most recent first.
///
/// Entries are trimmed and unique; resending an existing entry moves it to the
/// front instead of duplicating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendHistory {
    entries: VecDeque<String>,
}

impl SendHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from stored entries, re-applying the dedup and size rules.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut history = Self::new();
        let collected: Vec<S> = entries.into_iter().collect();
        // Stored newest first; replay oldest first so the order survives.
        for entry in collected.iter().rev() {
            history.record(entry.as_ref());
        }
        history
    }

    /// Records a sent text. Returns `false` if it was blank.
    pub fn record(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if let Some(pos) = self.entries.iter().position(|e| e == text) {
            self.entries.remove(pos);
        }
        self.entries.push_front(text.to_string());
        self.entries.truncate(HISTORY_LIMIT);
        true
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let entries: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resend_bubbles_to_top() {
        let mut history = SendHistory::new();
        history.record("one");
        history.record("two");
        history.record("three");
        history.record("  one ");

        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["one", "three", "two"]);
    }

    #[test]
    fn test_twenty_first_entry_drops_oldest() {
        let mut history = SendHistory::new();
        for i in 0..=HISTORY_LIMIT {
            history.record(&format!("msg {}", i));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.get(0), Some("msg 20"));
        assert!(history.iter().all(|e| e != "msg 0"));
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut history = SendHistory::new();
        assert!(!history.record("   \n"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_json_keeps_order() {
        let mut history = SendHistory::new();
        history.record("a");
        history.record("b");

        let raw = history.to_json().unwrap();
        assert_eq!(raw, r#"["b","a"]"#);
        assert_eq!(SendHistory::from_json(&raw).unwrap(), history);
    }
}
