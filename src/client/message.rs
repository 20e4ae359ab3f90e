use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Author of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// How a role is presented in the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttributes {
    pub label: &'static str,
    pub avatar: &'static str,
    /// ANSI SGR color code used for the sender prefix.
    pub accent: u8,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn display(self) -> DisplayAttributes {
        match self {
            Role::System => DisplayAttributes {
                label: "System",
                avatar: "⚙",
                accent: 33,
            },
            Role::User => DisplayAttributes {
                label: "You",
                avatar: "🧑",
                accent: 36,
            },
            Role::Assistant => DisplayAttributes {
                label: "Assistant",
                avatar: "🤖",
                accent: 35,
            },
        }
    }
}

/// One conversational turn.
///
/// Text only grows while the message is pending; once [`Message::seal`] is
/// called the message is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub sender: String,
    text: String,
    pub model: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    sealed: bool,
    #[serde(skip)]
    failed: bool,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let attrs = role.display();
        Self {
            id: Uuid::new_v4(),
            role,
            sender: attrs.label.to_string(),
            text: text.into(),
            model: String::new(),
            avatar: attrs.avatar.to_string(),
            created_at: Utc::now(),
            sealed: false,
            failed: false,
        }
    }

    /// A finished user turn.
    pub fn user(text: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::User, text);
        msg.sealed = true;
        msg
    }

    /// An empty assistant turn waiting for stream increments.
    pub fn pending_assistant() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Appends an increment. Returns `false` if the message is already sealed.
    pub fn append_text(&mut self, delta: &str) -> bool {
        if self.sealed {
            warn!(message_id = %self.id, "Dropping increment for sealed message");
            return false;
        }
        self.text.push_str(delta);
        true
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        if !self.sealed {
            self.model = model.into();
        }
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Seals the message as an error turn.
    pub fn seal_failed(&mut self) {
        self.failed = true;
        self.sealed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
