use uuid::Uuid;

use crate::client::message::{Message, Role};
use crate::client::transport::WireMessage;

/// Ordered list of turns for the current session. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// History in relay wire form, leaving out the message identified by
    /// `exclude` and assistant turns that failed or stayed empty.
    pub fn to_wire(&self, exclude: Option<Uuid>) -> Vec<WireMessage> {
        self.messages
            .iter()
            .filter(|m| Some(m.id) != exclude)
            .filter(|m| m.role != Role::Assistant || (!m.is_failed() && !m.text().is_empty()))
            .map(|m| WireMessage {
                role: m.role.as_str().to_string(),
                text: m.text().to_string(),
            })
            .collect()
    }
}
