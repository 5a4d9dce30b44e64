//! External collaborators the conversation core talks to.
//!
//! Storage, media upload and encryption live outside this crate. The
//! traits below are the whole contract; [`crate::InMemoryBackend`]
//! and [`crate::AesGcmCipher`] are the bundled implementations.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::message::{MediaKind, Message};

/// Durable store of conversations and their messages
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the full, ordered history of a conversation
    async fn fetch_conversation_history(&self, conversation_id: &str) -> ChatResult<Vec<Message>>;

    /// Create a conversation with its first message.
    ///
    /// Returns the identifier the store assigned to the new conversation.
    async fn create_conversation(
        &self,
        peer: &str,
        title: &str,
        first_message: &Message,
    ) -> ChatResult<String>;

    /// Append a message to an existing conversation
    async fn append_message(
        &self,
        conversation_id: &str,
        peer: &str,
        title: &str,
        message: &Message,
    ) -> ChatResult<()>;
}

/// Media to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Remote storage for photos and videos
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Upload media and return its remote location as a string
    async fn upload_media(
        &self,
        source: MediaSource,
        filename: &str,
        kind: MediaKind,
    ) -> ChatResult<String>;
}

/// Symmetric encryption applied to text bodies before they are stored
pub trait TextCipher: Send + Sync {
    fn encrypt_text(&self, plain_text: &str, key: &str) -> ChatResult<String>;

    fn decrypt_text(&self, cipher_text: &str, key: &str) -> ChatResult<String>;
}
