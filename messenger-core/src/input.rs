//! Input DTOs with garde validation.
//!
//! These structs validate what the screen receives before anything is
//! composed or sent.

use garde::Validate;
use serde::Deserialize;

use crate::error::{ChatError, ChatResult};
use crate::identity::safe_identity;

/// Validation constants
const MAX_MESSAGE_LENGTH: usize = 10000;
const MAX_EMAIL_LENGTH: usize = 320;
const MAX_TITLE_LENGTH: usize = 100;

/// Rejects bodies that are empty once whitespace is removed
fn validate_not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Message body is blank"));
    }
    Ok(())
}

/// Input for sending a text message
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct TextInput {
    #[garde(custom(validate_not_blank), length(max = MAX_MESSAGE_LENGTH))]
    pub body: String,
}

impl TextInput {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Validate, mapping blank bodies to [`ChatError::EmptyBody`]
    pub fn check(&self) -> ChatResult<()> {
        if self.body.trim().is_empty() {
            return Err(ChatError::EmptyBody);
        }
        self.validate_input()
    }
}

/// Input for opening a chat screen with a peer
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct OpenChatInput {
    #[garde(length(min = 1, max = MAX_EMAIL_LENGTH))]
    pub peer_email: String,
    #[garde(length(max = MAX_TITLE_LENGTH))]
    pub title: Option<String>,
    #[garde(skip)]
    pub conversation_id: Option<String>,
}

impl OpenChatInput {
    /// Validated, storage-safe peer identifier
    pub fn peer_id(&self) -> ChatResult<String> {
        self.validate_input()?;
        Ok(safe_identity(self.peer_email.trim()))
    }
}

/// Helper trait to convert garde validation errors into [`ChatError`]
pub trait ValidateExt {
    fn validate_input(&self) -> ChatResult<()>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> ChatResult<()> {
        self.validate()
            .map_err(|e| ChatError::InvalidInput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_bodies_are_empty() {
        assert_eq!(TextInput::new("").check(), Err(ChatError::EmptyBody));
        assert_eq!(TextInput::new("   ").check(), Err(ChatError::EmptyBody));
        assert_eq!(TextInput::new("\n\t ").check(), Err(ChatError::EmptyBody));
    }

    #[test]
    fn test_valid_body() {
        assert!(TextInput::new("hi").check().is_ok());
        assert!(TextInput::new("  padded  ").check().is_ok());
    }

    #[test]
    fn test_body_too_long() {
        let body = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            TextInput::new(body).check(),
            Err(ChatError::InvalidInput(_))
        ));

        let body = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(TextInput::new(body).check().is_ok());
    }

    #[test]
    fn test_open_chat_peer_id() {
        let input = OpenChatInput {
            peer_email: " friend@mail.com ".to_string(),
            title: Some("Friend".to_string()),
            conversation_id: None,
        };
        assert_eq!(input.peer_id().unwrap(), "friend-mail-com");
    }

    #[test]
    fn test_open_chat_rejects_bad_input() {
        let input = OpenChatInput {
            peer_email: String::new(),
            title: None,
            conversation_id: None,
        };
        assert!(matches!(input.peer_id(), Err(ChatError::InvalidInput(_))));

        let input = OpenChatInput {
            peer_email: "a@b.c".to_string(),
            title: Some("t".repeat(MAX_TITLE_LENGTH + 1)),
            conversation_id: None,
        };
        assert!(input.peer_id().is_err());
    }
}
