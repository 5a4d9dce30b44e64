//! In-memory conversation store and media storage.
//!
//! Backs tests and the console screen. Nothing is persisted.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::backend::{ConversationStore, MediaSource, MediaStorage};
use crate::error::{ChatError, ChatResult};
use crate::message::{MediaKind, Message};

/// Scheme of the locations returned by [`InMemoryBackend::upload_media`]
pub const MEDIA_LOCATION_PREFIX: &str = "memory://media/";

/// Backend state shared by every screen using it
pub struct InMemoryBackend {
    /// conversation_id -> ordered messages
    conversations: DashMap<String, Vec<Message>>,
    /// user_id -> conversation ids the user takes part in
    user_conversations: DashMap<String, Vec<String>>,
    /// filename -> uploaded bytes
    media: DashMap<String, Vec<u8>>,
    fail_creates: AtomicBool,
    fail_appends: AtomicBool,
    fail_fetches: AtomicBool,
    fail_uploads: AtomicBool,
    upload_location_override: Mutex<Option<String>>,
    fetch_delay_ms: AtomicU64,
    create_calls: AtomicUsize,
    append_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
            user_conversations: DashMap::new(),
            media: DashMap::new(),
            fail_creates: AtomicBool::new(false),
            fail_appends: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            fail_uploads: AtomicBool::new(false),
            upload_location_override: Mutex::new(None),
            fetch_delay_ms: AtomicU64::new(0),
            create_calls: AtomicUsize::new(0),
            append_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make uploads succeed but report `location` instead of the real one
    pub fn set_upload_location_override(&self, location: Option<&str>) {
        if let Ok(mut guard) = self.upload_location_override.lock() {
            *guard = location.map(String::from);
        }
    }

    /// Delay every history fetch by `delay`
    pub fn set_fetch_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.fetch_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Insert or overwrite a conversation's messages
    pub fn seed_conversation(&self, conversation_id: &str, messages: Vec<Message>) {
        self.conversations
            .insert(conversation_id.to_string(), messages);
    }

    /// Conversation ids a user takes part in
    pub fn conversations_for(&self, user_id: &str) -> Vec<String> {
        self.user_conversations
            .get(user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    pub fn message_count(&self, conversation_id: &str) -> usize {
        self.conversations
            .get(conversation_id)
            .map(|msgs| msgs.len())
            .unwrap_or(0)
    }

    /// Bytes uploaded under `filename`
    pub fn media(&self, filename: &str) -> Option<Vec<u8>> {
        self.media.get(filename).map(|bytes| bytes.value().clone())
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn index_conversation(&self, user_id: &str, conversation_id: &str) {
        let mut entry = self
            .user_conversations
            .entry(user_id.to_string())
            .or_insert_with(Vec::new);
        if !entry.iter().any(|id| id == conversation_id) {
            entry.push(conversation_id.to_string());
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryBackend {
    async fn fetch_conversation_history(&self, conversation_id: &str) -> ChatResult<Vec<Message>> {
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ChatError::store("history fetch failed"));
        }

        Ok(self
            .conversations
            .get(conversation_id)
            .map(|msgs| msgs.value().clone())
            .unwrap_or_default())
    }

    async fn create_conversation(
        &self,
        peer: &str,
        title: &str,
        first_message: &Message,
    ) -> ChatResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ChatError::store("create conversation failed"));
        }

        let conversation_id = format!("conversation_{}", first_message.id());
        match self.conversations.entry(conversation_id.clone()) {
            Entry::Occupied(_) => {
                return Err(ChatError::store(format!(
                    "conversation {} already exists",
                    conversation_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![first_message.clone()]);
            }
        }
        self.index_conversation(first_message.sender_id(), &conversation_id);
        self.index_conversation(peer, &conversation_id);

        info!(
            conversation_id = %conversation_id,
            peer = %peer,
            title = %title,
            "Created conversation"
        );
        Ok(conversation_id)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        peer: &str,
        _title: &str,
        message: &Message,
    ) -> ChatResult<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(ChatError::store("append message failed"));
        }

        let mut entry = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| ChatError::store(format!("conversation {} not found", conversation_id)))?;
        entry.push(message.clone());
        drop(entry);

        self.index_conversation(message.sender_id(), conversation_id);
        self.index_conversation(peer, conversation_id);

        debug!(conversation_id = %conversation_id, message_id = %message.id(), "Appended message");
        Ok(())
    }
}

#[async_trait]
impl MediaStorage for InMemoryBackend {
    async fn upload_media(
        &self,
        source: MediaSource,
        filename: &str,
        kind: MediaKind,
    ) -> ChatResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ChatError::upload(format!("{} upload failed", kind.as_str())));
        }

        let bytes = match source {
            MediaSource::Bytes(bytes) => bytes,
            MediaSource::File(path) => tokio::fs::read(&path).await.map_err(|e| {
                ChatError::upload(format!("failed to read {}: {}", path.display(), e))
            })?,
        };

        info!(filename = %filename, size = bytes.len(), "Uploaded {}", kind.as_str());
        self.media.insert(filename.to_string(), bytes);

        let location_override = self
            .upload_location_override
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        Ok(location_override.unwrap_or_else(|| format!("{}{}", MEDIA_LOCATION_PREFIX, filename)))
    }
}
