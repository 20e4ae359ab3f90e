use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::composer::{Composer, ComposerError};
use crate::client::conversation::Conversation;
use crate::client::decoder::{DecodeEvent, DecoderState, StreamDecoder};
use crate::client::message::Message;
use crate::client::prefs::{self, PreferenceStore, Preferences};
use crate::client::transport::{ChatRequest, ChatTransport, RelayResponse};
use crate::client::ClientError;
use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// Per-send overrides of the stored settings.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Sampling values used when a send does not override them.
#[derive(Debug, Clone, Copy)]
pub struct SamplingDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Notifications delivered synchronously while a send is in progress.
#[derive(Debug)]
pub enum StreamUpdate<'a> {
    UserMessage(&'a Message),
    Started(&'a Message),
    Metadata(&'a Message),
    Delta { message: &'a Message, delta: &'a str },
    Finished(&'a Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub message_id: Uuid,
    pub failed: bool,
}

/// Conversation, composer and stored settings for one chat session.
pub struct ChatSession {
    conversation: Conversation,
    composer: Composer,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn PreferenceStore>,
    prefs: Preferences,
    sampling: SamplingDefaults,
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn PreferenceStore>,
        sampling: SamplingDefaults,
    ) -> Result<Self, ClientError> {
        let prefs = Preferences::load(store.as_ref())?;
        let history = prefs::load_history(store.as_ref())?;

        Ok(Self {
            conversation: Conversation::new(),
            composer: Composer::new(history),
            transport,
            store,
            prefs,
            sampling,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) -> Result<(), ClientError> {
        self.prefs.api_key = api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        self.prefs.save(self.store.as_ref())?;
        Ok(())
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), ClientError> {
        self.prefs.model_name = model.trim().to_string();
        self.prefs.save(self.store.as_ref())?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), ClientError> {
        if self.composer.is_sending() {
            return Err(ComposerError::Busy.into());
        }
        self.conversation.clear();
        Ok(())
    }

    pub fn clear_history(&mut self) -> Result<(), ClientError> {
        self.composer.clear_history();
        prefs::save_history(self.store.as_ref(), self.composer.history())?;
        Ok(())
    }

    /// Sends `text` and streams the reply into a new assistant message.
    ///
    /// Returns once the relay stream has ended or failed; transport and relay
    /// failures end up as text in the assistant message rather than as `Err`.
    pub async fn send<F>(
        &mut self,
        text: &str,
        options: &SendOptions,
        mut on_update: F,
    ) -> Result<SendOutcome, ClientError>
    where
        F: FnMut(StreamUpdate<'_>),
    {
        let api_key = options
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.prefs.api_key.clone())
            .ok_or(ClientError::MissingApiKey)?;

        let text = self.composer.begin(text)?;
        if let Err(e) = prefs::save_history(self.store.as_ref(), self.composer.history()) {
            warn!("Failed to persist send history: {}", e);
        }

        let user_id = self.conversation.push(Message::user(text));
        if let Some(message) = self.conversation.get(user_id) {
            on_update(StreamUpdate::UserMessage(message));
        }

        let message_id = self.conversation.push(Message::pending_assistant());
        if let Some(message) = self.conversation.get(message_id) {
            on_update(StreamUpdate::Started(message));
        }

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.prefs.model_name.clone());
        let request = ChatRequest {
            api_key: Some(api_key),
            messages: self.conversation.to_wire(Some(message_id)),
            model: Some(model.clone()),
            temperature: Some(options.temperature.unwrap_or(self.sampling.temperature)),
            max_tokens: Some(options.max_tokens.unwrap_or(self.sampling.max_tokens)),
        };

        info!(message_id = %message_id, model = %model, "Dispatching chat request");
        let mut decoder = StreamDecoder::new();

        match self.transport.open(&request).await {
            Ok(RelayResponse::Stream(mut stream)) => {
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(bytes) => {
                            let events = decoder.feed(&bytes);
                            apply_events(&mut self.conversation, message_id, events, &mut on_update);
                        }
                        Err(e) => {
                            warn!(message_id = %message_id, "Relay stream broke: {}", e);
                            let events = decoder.abort(&e.to_string());
                            apply_events(&mut self.conversation, message_id, events, &mut on_update);
                            break;
                        }
                    }
                }
                let events = decoder.finish();
                apply_events(&mut self.conversation, message_id, events, &mut on_update);
            }
            Ok(RelayResponse::Failed(failure)) => {
                warn!(message_id = %message_id, status = failure.status, "Relay rejected chat request");
                if let Some(event) = decoder.fail(&failure) {
                    apply_events(&mut self.conversation, message_id, vec![event], &mut on_update);
                }
            }
            Err(e) => {
                warn!(message_id = %message_id, "Chat request failed: {}", e);
                let events = decoder.abort(&e.to_string());
                apply_events(&mut self.conversation, message_id, events, &mut on_update);
            }
        }

        let failed = decoder.state() == DecoderState::Failed;
        if let Some(message) = self.conversation.get_mut(message_id) {
            if failed {
                message.seal_failed();
            } else {
                message.seal();
            }
        }
        self.composer.finish();
        if let Some(message) = self.conversation.get(message_id) {
            info!(message_id = %message_id, chars = message.text().len(), "Response complete");
            on_update(StreamUpdate::Finished(message));
        }

        Ok(SendOutcome { message_id, failed })
    }
}

fn apply_events<F>(
    conversation: &mut Conversation,
    message_id: Uuid,
    events: Vec<DecodeEvent>,
    on_update: &mut F,
) where
    F: FnMut(StreamUpdate<'_>),
{
    for event in events {
        let Some(message) = conversation.get_mut(message_id) else {
            warn!(message_id = %message_id, "Pending message vanished; dropping increment");
            return;
        };
        match event {
            DecodeEvent::Metadata(meta) => {
                message.set_model(meta.model);
                on_update(StreamUpdate::Metadata(message));
            }
            DecodeEvent::Content(delta) => {
                message.append_text(&delta);
                on_update(StreamUpdate::Delta {
                    message,
                    delta: &delta,
                });
            }
        }
    }
}
