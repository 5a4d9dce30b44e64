//! Error types for the conversation core.

use thiserror::Error;

/// Errors produced while composing, dispatching or loading messages.
///
/// Precondition failures (`EmptyBody`, `MissingIdentity`, `InvalidInput`)
/// mean no message was built. Collaborator failures (`Store`, `Upload`,
/// `Crypto`) carry the collaborator's own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message body is empty")]
    EmptyBody,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No identity available for the current user")]
    MissingIdentity,

    #[error("Conversation has already been created for this session")]
    AlreadyCreated,

    #[error("Upload returned an invalid remote location: '{raw}'")]
    InvalidRemoteLocation { raw: String },

    #[error("Placeholder image unavailable: {0}")]
    Placeholder(String),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Media upload error: {0}")]
    Upload(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chat screen is closed")]
    ScreenClosed,
}

impl ChatError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// True for failures reported by an external collaborator rather than
    /// rejected locally before any call was made.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Upload(_) | Self::Crypto(_) | Self::InvalidRemoteLocation { .. }
        )
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
