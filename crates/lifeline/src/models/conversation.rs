//! Conversation model: a two-party message thread

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Unique identifier for a conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Denormalized profile of a conversation participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// A conversation between exactly two identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: ConversationId,
    /// Emails of both participants
    pub participants: Vec<String>,
    #[serde(default)]
    pub participant_users: Vec<ParticipantUser>,
    /// Truncated preview of the latest message
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    /// Blood request this conversation was started from, if any
    #[serde(default)]
    pub request_id: Option<String>,
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participants: vec![a.into(), b.into()],
            participant_users: Vec::new(),
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            request_id: None,
        }
    }

    /// Profile for a participant, matched case-insensitively by email
    pub fn participant_user(&self, email: &str) -> Option<&ParticipantUser> {
        self.participant_users
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conversation() {
        let json = r#"{
            "_id": "c1",
            "participants": ["donor@example.com", "seeker@example.com"],
            "participantUsers": [
                { "email": "donor@example.com", "name": "Donor", "photoURL": "https://img/1.png", "role": "donor" }
            ],
            "lastMessage": "See you at 5",
            "lastMessageAt": "2026-03-01T10:00:00Z",
            "unreadCount": 2,
            "requestId": "r9"
        }"#;

        let c: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(c.id.as_str(), "c1");
        assert_eq!(c.unread_count, 2);
        assert_eq!(c.request_id.as_deref(), Some("r9"));
        let donor = c.participant_user("DONOR@example.com").unwrap();
        assert_eq!(donor.photo_url.as_deref(), Some("https://img/1.png"));
        assert!(c.participant_user("seeker@example.com").is_none());
    }
}
