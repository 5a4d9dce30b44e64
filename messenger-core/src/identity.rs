//! User identity: storage-safe identifiers and the local sender.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

/// Characters the conversation store refuses inside a key
const UNSAFE_KEY_CHARS: [char; 7] = ['.', '@', '#', '$', '[', ']', '/'];

/// Display name used for the local user's own messages
pub const SELF_DISPLAY_NAME: &str = "Me";

/// Normalize a raw email into an identifier usable as a storage key.
///
/// Every unsafe key character is replaced with `-`. Total and
/// deterministic, so the sending side and the lookup side always agree.
pub fn safe_identity(raw_email: &str) -> String {
    raw_email
        .chars()
        .map(|c| if UNSAFE_KEY_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// Author of a message as shown in the thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub sender_id: String,
    pub display_name: String,
    pub photo_url: String,
}

/// The signed-in user, passed explicitly to whatever composes messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    email: String,
    safe_id: String,
}

impl SelfIdentity {
    /// Build the identity from the cached email of the current session
    pub fn from_email(email: &str) -> ChatResult<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ChatError::MissingIdentity);
        }

        Ok(Self {
            email: email.to_string(),
            safe_id: safe_identity(email),
        })
    }

    /// Build the identity from an optional cached email
    pub fn from_cached(email: Option<&str>) -> ChatResult<Self> {
        email.ok_or(ChatError::MissingIdentity).and_then(Self::from_email)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn safe_id(&self) -> &str {
        &self.safe_id
    }

    pub fn sender(&self) -> Sender {
        Sender {
            sender_id: self.safe_id.clone(),
            display_name: SELF_DISPLAY_NAME.to_string(),
            photo_url: String::new(),
        }
    }
}
