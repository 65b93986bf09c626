//! Message model for conversation threads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConversationId;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single message within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_email: String,
    pub receiver_email: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>, conversation_id: impl Into<ConversationId>) -> MessageBuilder {
        MessageBuilder::new(id.into(), conversation_id.into())
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    conversation_id: ConversationId,
    sender_email: String,
    receiver_email: String,
    content: String,
    created_at: Option<DateTime<Utc>>,
    read: bool,
}

impl MessageBuilder {
    fn new(id: MessageId, conversation_id: ConversationId) -> Self {
        Self {
            id,
            conversation_id,
            sender_email: String::new(),
            receiver_email: String::new(),
            content: String::new(),
            created_at: None,
            read: false,
        }
    }

    pub fn from(mut self, sender_email: impl Into<String>) -> Self {
        self.sender_email = sender_email.into();
        self
    }

    pub fn to(mut self, receiver_email: impl Into<String>) -> Self {
        self.receiver_email = receiver_email.into();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_email: self.sender_email,
            receiver_email: self.receiver_email,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            read: self.read,
        }
    }
}

/// Body of `POST /messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub receiver_email: String,
    pub content: String,
}
