//! Turns user input into [`Message`] records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

use crate::backend::TextCipher;
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::identity::SelfIdentity;
use crate::input::TextInput;
use crate::message::{Dimensions, MediaAttachment, MediaKind, Message, MessageContent, Placeholder};
use crate::message_id::{derive_message_id, upload_filename, with_unique_suffix};

/// Media picked by the user, waiting for its upload to finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMedia {
    pub id: String,
    pub kind: MediaKind,
    pub filename: String,
}

/// Builds outgoing messages for one conversation
pub struct Composer {
    identity: SelfIdentity,
    peer: String,
    cipher: Arc<dyn TextCipher>,
    encryption_key: String,
    placeholder_symbol: String,
    unique_ids: bool,
}

impl Composer {
    pub fn new(
        identity: SelfIdentity,
        peer: impl Into<String>,
        cipher: Arc<dyn TextCipher>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            identity,
            peer: peer.into(),
            cipher,
            encryption_key: config.encryption_key.clone(),
            placeholder_symbol: config.placeholder_symbol.clone(),
            unique_ids: config.unique_message_ids,
        }
    }

    pub fn identity(&self) -> &SelfIdentity {
        &self.identity
    }

    /// Id for a message sent at `at`
    pub fn message_id_at(&self, at: DateTime<Utc>) -> String {
        let id = derive_message_id(&self.peer, self.identity.safe_id(), at);
        if self.unique_ids {
            with_unique_suffix(id)
        } else {
            id
        }
    }

    /// Compose an encrypted text message.
    ///
    /// Blank bodies produce no message.
    pub fn compose_text(&self, body: &str) -> ChatResult<Message> {
        if let Err(e) = TextInput::new(body).check() {
            debug!("Rejected text message: {}", e);
            return Err(e);
        }

        let sealed = self.cipher.encrypt_text(body, &self.encryption_key)?;
        let sent_at = Utc::now();

        Ok(Message::new(
            self.identity.sender(),
            self.message_id_at(sent_at),
            sent_at,
            MessageContent::Text { body: sealed },
        ))
    }

    /// Reserve the id and upload filename for a picked photo or video
    pub fn prepare_media(&self, kind: MediaKind) -> PendingMedia {
        let id = self.message_id_at(Utc::now());
        let filename = upload_filename(&id, kind);
        PendingMedia { id, kind, filename }
    }

    /// Compose a media message once its upload returned a remote location
    pub fn compose_media(&self, pending: PendingMedia, remote_location: &str) -> ChatResult<Message> {
        let url = Url::parse(remote_location).map_err(|e| {
            debug!("Upload location '{}' is not a URI: {}", remote_location, e);
            ChatError::InvalidRemoteLocation {
                raw: remote_location.to_string(),
            }
        })?;
        let placeholder = Placeholder::system(&self.placeholder_symbol)?;

        let media = MediaAttachment::uploaded(url, placeholder, Dimensions::default());
        let content = match pending.kind {
            MediaKind::Photo => MessageContent::Photo(media),
            MediaKind::Video => MessageContent::Video(media),
        };

        Ok(Message::new(
            self.identity.sender(),
            pending.id,
            Utc::now(),
            content,
        ))
    }
}
