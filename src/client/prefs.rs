use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::client::history::SendHistory;
use crate::config::DEFAULT_MODEL;

pub const API_KEY_KEY: &str = "prattle.api_key";
pub const MODEL_NAME_KEY: &str = "prattle.model_name";
pub const HISTORY_KEY: &str = "prattle.history";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage Error: {0}")]
    Backend(String),
    #[error("Corrupt stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<duckdb::Error> for StoreError {
    fn from(e: duckdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Narrow port over durable scalar storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        values.remove(key);
        Ok(())
    }
}

/// The API key and model choice, read from and written through a [`PreferenceStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub api_key: Option<String>,
    pub model_name: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Preferences {
    pub fn load(store: &dyn PreferenceStore) -> Result<Self, StoreError> {
        let api_key = store
            .get(API_KEY_KEY)?
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let model_name = store
            .get(MODEL_NAME_KEY)?
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            model_name,
        })
    }

    pub fn save(&self, store: &dyn PreferenceStore) -> Result<(), StoreError> {
        match &self.api_key {
            Some(key) => store.set(API_KEY_KEY, key)?,
            None => store.remove(API_KEY_KEY)?,
        }
        store.set(MODEL_NAME_KEY, &self.model_name)
    }
}

pub fn load_history(store: &dyn PreferenceStore) -> Result<SendHistory, StoreError> {
    match store.get(HISTORY_KEY)? {
        Some(raw) => match SendHistory::from_json(&raw) {
            Ok(history) => Ok(history),
            Err(e) => {
                warn!("Discarding unreadable send history: {}", e);
                Ok(SendHistory::new())
            }
        },
        None => Ok(SendHistory::new()),
    }
}

pub fn save_history(store: &dyn PreferenceStore, history: &SendHistory) -> Result<(), StoreError> {
    store.set(HISTORY_KEY, &history.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_uses_default() {
        let store = MemoryStore::new();
        let prefs = Preferences::load(&store).unwrap();
        assert_eq!(prefs.model_name, DEFAULT_MODEL);
        assert!(prefs.api_key.is_none());
    }

    #[test]
    fn test_blank_api_key_counts_as_absent() {
        let store = MemoryStore::new();
        store.set(API_KEY_KEY, "   ").unwrap();
        assert!(Preferences::load(&store).unwrap().api_key.is_none());
    }

    #[test]
    fn test_corrupt_history_is_discarded() {
        let store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not json").unwrap();
        assert!(load_history(&store).unwrap().is_empty());
    }
}
