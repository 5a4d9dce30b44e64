//! Pulls conversation history into a session.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::ConversationStore;
use crate::error::ChatResult;
use crate::message::Message;
use crate::session::ConversationSession;

/// What a history fetch did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdate {
    Replaced { count: usize },
    Unchanged,
    Failed,
}

/// Fetches history and applies it to a session
#[derive(Clone)]
pub struct Listener {
    store: Arc<dyn ConversationStore>,
}

impl Listener {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub async fn fetch_history(&self, conversation_id: &str) -> ChatResult<Vec<Message>> {
        self.store.fetch_conversation_history(conversation_id).await
    }

    /// Apply a fetch result.
    ///
    /// Non-empty histories replace the loaded messages wholesale. Empty
    /// histories and errors leave them untouched, so a conversation that
    /// really became empty keeps showing its last non-empty state.
    pub fn apply(session: &mut ConversationSession, result: ChatResult<Vec<Message>>) -> HistoryUpdate {
        match result {
            Ok(messages) if messages.is_empty() => {
                debug!(peer = %session.peer(), "History is empty, keeping loaded messages");
                HistoryUpdate::Unchanged
            }
            Ok(messages) => {
                let count = messages.len();
                session.replace_messages(messages);
                info!(peer = %session.peer(), count, "Loaded conversation history");
                HistoryUpdate::Replaced { count }
            }
            Err(e) => {
                warn!("Failed to get messages for {}: {}", session.peer(), e);
                HistoryUpdate::Failed
            }
        }
    }

    /// Fetch and apply in one step. New sessions have nothing to fetch.
    pub async fn refresh(&self, session: &mut ConversationSession) -> HistoryUpdate {
        let Some(conversation_id) = session.conversation_id().map(String::from) else {
            return HistoryUpdate::Unchanged;
        };
        let result = self.fetch_history(&conversation_id).await;
        Self::apply(session, result)
    }
}
