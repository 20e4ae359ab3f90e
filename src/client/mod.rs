//! Terminal-side chat client: conversation state, the send pipeline and the
//! relay stream decoder.

pub mod composer;
pub mod conversation;
pub mod decoder;
pub mod history;
pub mod message;
pub mod prefs;
pub mod session;
pub mod transport;

use thiserror::Error;

use composer::ComposerError;
use prefs::StoreError;

pub use conversation::Conversation;
pub use message::{Message, Role};
pub use session::{ChatSession, SendOptions, StreamUpdate};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No API key configured. Run `prattle config set-key <KEY>` or pass --api-key")]
    MissingApiKey,
    #[error(transparent)]
    Composer(#[from] ComposerError),
    #[error("Network Error: {0}")]
    Transport(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}
