use tracing::info;

use crate::error::{ChatError, ChatResult};
use crate::message::Message;

/// Whether the backend already holds this conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    New,
    Existing { conversation_id: String },
}

/// Per-screen conversation state.
///
/// Owned by exactly one screen for its lifetime. `loaded_messages` is a
/// cache of the last fetched history, not the system of record.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    peer: String,
    title: String,
    state: SessionState,
    loaded_messages: Vec<Message>,
}

impl ConversationSession {
    /// Session for a peer with no conversation yet
    pub fn new_conversation(peer: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            title: title.into(),
            state: SessionState::New,
            loaded_messages: Vec::new(),
        }
    }

    /// Session for a known conversation
    pub fn existing(
        peer: impl Into<String>,
        title: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            peer: peer.into(),
            title: title.into(),
            state: SessionState::Existing {
                conversation_id: conversation_id.into(),
            },
            loaded_messages: Vec::new(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_new_conversation(&self) -> bool {
        matches!(self.state, SessionState::New)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::New => None,
            SessionState::Existing { conversation_id } => Some(conversation_id),
        }
    }

    pub fn loaded_messages(&self) -> &[Message] {
        &self.loaded_messages
    }

    /// Record that the backend created the conversation.
    ///
    /// Fires once per session; later calls fail and change nothing.
    pub fn mark_created(&mut self, conversation_id: impl Into<String>) -> ChatResult<()> {
        if !self.is_new_conversation() {
            return Err(ChatError::AlreadyCreated);
        }

        let conversation_id = conversation_id.into();
        info!(
            peer = %self.peer,
            conversation_id = %conversation_id,
            "Conversation created"
        );
        self.state = SessionState::Existing { conversation_id };
        Ok(())
    }

    /// Swap in a freshly fetched history
    pub(crate) fn replace_messages(&mut self, messages: Vec<Message>) {
        self.loaded_messages = messages;
    }
}
