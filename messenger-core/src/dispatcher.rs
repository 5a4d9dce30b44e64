//! Routes composed messages to the conversation store.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::ConversationStore;
use crate::message::Message;
use crate::session::{ConversationSession, SessionState};

/// Result of handing one message to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Sends messages with create-or-append semantics
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn ConversationStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Send `message` according to the session state.
    ///
    /// A new session creates the conversation and becomes existing on
    /// success. Failures are not retried or queued.
    pub async fn send(&self, session: &mut ConversationSession, message: &Message) -> DeliveryOutcome {
        let result = match session.state().clone() {
            SessionState::New => {
                let created = self
                    .store
                    .create_conversation(session.peer(), session.title(), message)
                    .await;
                created.and_then(|conversation_id| session.mark_created(conversation_id))
            }
            SessionState::Existing { conversation_id } => {
                self.store
                    .append_message(&conversation_id, session.peer(), session.title(), message)
                    .await
            }
        };

        match result {
            Ok(()) => {
                info!(message_id = %message.id(), kind = message.kind(), "Message sent");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!("Failed to send message {}: {}", message.id(), e);
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
