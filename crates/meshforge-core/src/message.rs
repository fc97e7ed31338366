//! Host-supplied conversation and message types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StageError;

/// A single chat message, immutable and owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Host-assigned message identifier.
    pub id: String,
    /// Free text; may contain zero or more fenced code segments.
    pub content: String,
}

impl Message {
    /// Creates a new message.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// The conversation body handed to the pipeline by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Messages in host order.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Finds the message with the given id.
    pub fn find_message(&self, id: &str) -> Result<&Message, MessageError> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| MessageError::NotFound { id: id.to_string() })
    }
}

/// Errors raised while resolving messages from the conversation body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The requested message id is absent from the conversation.
    #[error("message {id} not found in conversation")]
    NotFound { id: String },
}

impl StageError for MessageError {
    fn code(&self) -> &'static str {
        match self {
            MessageError::NotFound { .. } => "MESSAGE_001",
        }
    }

    fn category(&self) -> &'static str {
        "message"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_message() {
        let conversation = Conversation {
            messages: vec![
                Message::new("m1", "first"),
                Message::new("m2", "second"),
            ],
        };

        assert_eq!(conversation.find_message("m2").unwrap().content, "second");
    }

    #[test]
    fn test_find_message_missing() {
        let conversation = Conversation::default();
        let err = conversation.find_message("m9").unwrap_err();
        assert_eq!(err, MessageError::NotFound { id: "m9".to_string() });
        assert!(err.to_string().contains("m9"));
    }

    #[test]
    fn test_message_json_shape() {
        let json = r#"{"messages":[{"id":"m1","content":"hello"}]}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].id, "m1");
    }
}
