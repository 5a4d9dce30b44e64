use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

pub const DEFAULT_TITLE: &str = "User";
pub const DEFAULT_PLACEHOLDER: &str = "plus";
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings shared by every chat screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Shared secret text bodies are encrypted with
    pub encryption_key: String,
    /// Title used when a screen is opened without one
    pub default_title: String,
    /// System symbol shown until media is available
    pub placeholder_symbol: String,
    /// Append a random suffix to message ids
    pub unique_message_ids: bool,
    /// Buffer size of the screen event channel
    pub event_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            default_title: DEFAULT_TITLE.to_string(),
            placeholder_symbol: DEFAULT_PLACEHOLDER.to_string(),
            unique_message_ids: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ChatConfig {
    /// Load from `MESSENGER_*` environment variables, falling back to defaults
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        let defaults = Self::default();

        let encryption_key = lookup("MESSENGER_ENCRYPTION_KEY")
            .ok_or_else(|| ChatError::Config("MESSENGER_ENCRYPTION_KEY is not set".to_string()))?;

        let unique_message_ids = match lookup("MESSENGER_UNIQUE_IDS") {
            Some(raw) => parse_flag(&raw)?,
            None => defaults.unique_message_ids,
        };

        let config = Self {
            encryption_key,
            default_title: lookup("MESSENGER_DEFAULT_TITLE").unwrap_or(defaults.default_title),
            placeholder_symbol: lookup("MESSENGER_PLACEHOLDER")
                .unwrap_or(defaults.placeholder_symbol),
            unique_message_ids,
            event_capacity: defaults.event_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.encryption_key.is_empty() {
            return Err(ChatError::Config("encryption key is empty".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(ChatError::Config(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = key.into();
        self
    }
}

fn parse_flag(raw: &str) -> ChatResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ChatError::Config(format!(
            "MESSENGER_UNIQUE_IDS has invalid value '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.default_title, "User");
        assert_eq!(config.placeholder_symbol, "plus");
        assert!(!config.unique_message_ids);
        assert!(config.validate().is_err());
        assert!(config.with_encryption_key("k").validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ChatConfig::from_lookup(lookup_from(&[
            ("MESSENGER_ENCRYPTION_KEY", "secret"),
            ("MESSENGER_DEFAULT_TITLE", "Friend"),
            ("MESSENGER_UNIQUE_IDS", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.encryption_key, "secret");
        assert_eq!(config.default_title, "Friend");
        assert_eq!(config.placeholder_symbol, "plus");
        assert!(config.unique_message_ids);
    }

    #[test]
    fn test_missing_key() {
        let err = ChatConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_invalid_flag() {
        let err = ChatConfig::from_lookup(lookup_from(&[
            ("MESSENGER_ENCRYPTION_KEY", "secret"),
            ("MESSENGER_UNIQUE_IDS", "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }
}
