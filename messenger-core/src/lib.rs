//! Messenger conversation core
//!
//! Composes outgoing messages, tracks whether a chat screen's conversation
//! exists yet, routes messages to the conversation store and pulls the
//! history back. Storage, media upload and encryption are collaborators
//! behind the traits in [`backend`].

pub mod backend;
mod composer;
mod config;
mod crypto;
mod dispatcher;
mod error;
mod identity;
pub mod input;
mod listener;
mod memory;
mod message;
pub mod message_id;
mod screen;
mod session;

pub use backend::{ConversationStore, MediaSource, MediaStorage, TextCipher};
pub use composer::{Composer, PendingMedia};
pub use config::ChatConfig;
pub use crypto::AesGcmCipher;
pub use dispatcher::{DeliveryOutcome, Dispatcher};
pub use error::{ChatError, ChatResult};
pub use identity::{safe_identity, SelfIdentity, Sender};
pub use listener::{HistoryUpdate, Listener};
pub use memory::InMemoryBackend;
pub use message::{
    Dimensions, MediaAttachment, MediaKind, Message, MessageContent, Placeholder, Renderable,
};
pub use screen::{ChatScreen, ScreenEvent, ScreenHandle, ScreenServices, SessionSnapshot, TranscriptLine};
pub use session::{ConversationSession, SessionState};
