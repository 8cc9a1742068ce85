//! Row types for the conversations and messages tables.
//! Serialized camelCase, which is also the shape pushed over the socket.

use serde::{Deserialize, Serialize};

/// One-to-one conversation between two identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Identity that opened the conversation
    pub sender_id: String,
    pub recipient_id: String,
    pub created_at: String,
}

impl Conversation {
    pub fn participants(&self) -> [&str; 2] {
        [self.sender_id.as_str(), self.recipient_id.as_str()]
    }

    pub fn has_participant(&self, identity: &str) -> bool {
        self.sender_id == identity || self.recipient_id == identity
    }

    /// The participant that is not `identity`, if `identity` takes part at all.
    pub fn other_participant(&self, identity: &str) -> Option<&str> {
        if self.sender_id == identity {
            Some(&self.recipient_id)
        } else if self.recipient_id == identity {
            Some(&self.sender_id)
        } else {
            None
        }
    }
}

/// A direct message inside a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Input for persisting a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
}
