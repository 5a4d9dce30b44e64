use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backend::TextCipher;
use crate::error::{ChatError, ChatResult};
use crate::identity::Sender;

/// A single message in a conversation.
///
/// The id and the content kind are fixed at construction; there are no
/// setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    sender: Sender,
    id: String,
    sent_at: DateTime<Utc>,
    content: MessageContent,
}

impl Message {
    pub fn new(sender: Sender, id: String, sent_at: DateTime<Utc>, content: MessageContent) -> Self {
        Self {
            sender,
            id,
            sent_at,
            content,
        }
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn sender_id(&self) -> &str {
        &self.sender.sender_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn kind(&self) -> &'static str {
        self.content.kind()
    }

    /// Decrypt a text body. `None` for non-text content.
    pub fn decrypted_text(&self, cipher: &dyn TextCipher, key: &str) -> Option<ChatResult<String>> {
        self.content
            .text_body()
            .map(|body| cipher.decrypt_text(body, key))
    }
}

/// Message payload, one variant per content kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Photo(MediaAttachment),
    Video(MediaAttachment),
    Location {
        latitude: f64,
        longitude: f64,
    },
    Audio {
        url: Url,
        duration_secs: f32,
    },
    Contact {
        display_name: String,
        phone_numbers: Vec<String>,
        emails: Vec<String>,
    },
    Link {
        url: Url,
        title: Option<String>,
        teaser: Option<String>,
    },
    Custom {
        payload: serde_json::Value,
    },
}

impl MessageContent {
    /// Stable lowercase name of the content kind
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Photo(_) => "photo",
            MessageContent::Video(_) => "video",
            MessageContent::Location { .. } => "location",
            MessageContent::Audio { .. } => "audio",
            MessageContent::Contact { .. } => "contact",
            MessageContent::Link { .. } => "link",
            MessageContent::Custom { .. } => "custom",
        }
    }

    pub fn text_body(&self) -> Option<&str> {
        match self {
            MessageContent::Text { body } => Some(body),
            _ => None,
        }
    }

    pub fn media(&self) -> Option<&MediaAttachment> {
        match self {
            MessageContent::Photo(media) | MessageContent::Video(media) => Some(media),
            _ => None,
        }
    }
}

/// Kinds of media the screen can attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn file_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "png",
            MediaKind::Video => "mov",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Named fallback image shown until real media is available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    symbol: String,
}

impl Placeholder {
    pub fn system(symbol: &str) -> ChatResult<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ChatError::Placeholder(
                "placeholder symbol name is empty".to_string(),
            ));
        }
        Ok(Self {
            symbol: symbol.to_string(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Photo or video attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    remote_location: Option<Url>,
    #[serde(skip)]
    local_preview: Option<Vec<u8>>,
    placeholder: Placeholder,
    dimensions: Dimensions,
}

/// What a renderer should draw for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Renderable<'a> {
    Remote(&'a Url),
    Preview(&'a [u8]),
    Placeholder(&'a Placeholder),
}

impl MediaAttachment {
    /// Attachment whose upload has not completed yet
    pub fn pending(placeholder: Placeholder, local_preview: Option<Vec<u8>>) -> Self {
        Self {
            remote_location: None,
            local_preview,
            placeholder,
            dimensions: Dimensions::default(),
        }
    }

    /// Attachment backed by an uploaded remote location
    pub fn uploaded(remote_location: Url, placeholder: Placeholder, dimensions: Dimensions) -> Self {
        Self {
            remote_location: Some(remote_location),
            local_preview: None,
            placeholder,
            dimensions,
        }
    }

    pub fn remote_location(&self) -> Option<&Url> {
        self.remote_location.as_ref()
    }

    pub fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Once a remote location exists it always wins over preview and placeholder.
    pub fn renderable(&self) -> Renderable<'_> {
        if let Some(url) = &self.remote_location {
            Renderable::Remote(url)
        } else if let Some(preview) = &self.local_preview {
            Renderable::Preview(preview)
        } else {
            Renderable::Placeholder(&self.placeholder)
        }
    }
}
