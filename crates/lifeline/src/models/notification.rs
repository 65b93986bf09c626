//! Notification model
//!
//! On the wire a notification carries a `type` string and an open-ended
//! `data` object whose shape depends on the type. Here the pair is decoded
//! into [`NotificationKind`], one payload per known type, with
//! [`NotificationKind::Other`] catching anything unrecognised.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::ConversationId;

/// Unique identifier for a notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a notification is about, with the entity references it carries
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// A blood request near the user needs donors urgently
    UrgentRequest {
        request_id: String,
        blood_group: Option<String>,
        district: Option<String>,
    },
    DonationConfirmed {
        request_id: Option<String>,
        donation_id: Option<String>,
    },
    DonationCompleted {
        request_id: Option<String>,
        donation_id: Option<String>,
    },
    NewMessage {
        conversation_id: ConversationId,
        sender_email: Option<String>,
        sender_name: Option<String>,
    },
    Welcome,
    /// A donor was matched to one of the user's requests
    RequestMatched {
        request_id: String,
        donor_email: Option<String>,
    },
    /// `other`, an unknown type, or a payload that didn't match its type
    Other { kind: String, data: Value },
}

/// Where the UI should navigate when a notification is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Request(String),
    Conversation(ConversationId),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrgentRequestData {
    request_id: String,
    blood_group: Option<String>,
    district: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DonationData {
    request_id: Option<String>,
    donation_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMessageData {
    conversation_id: String,
    sender_email: Option<String>,
    sender_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestMatchedData {
    request_id: String,
    donor_email: Option<String>,
}

fn payload<T: DeserializeOwned>(data: &Value) -> Option<T> {
    if data.is_null() {
        return serde_json::from_value(json!({})).ok();
    }
    serde_json::from_value(data.clone()).ok()
}

impl NotificationKind {
    /// Decode a wire `type` and `data` pair
    pub fn decode(kind: &str, data: Value) -> Self {
        let decoded = match kind {
            "urgent_request" => payload::<UrgentRequestData>(&data).map(|d| Self::UrgentRequest {
                request_id: d.request_id,
                blood_group: d.blood_group,
                district: d.district,
            }),
            "donation_confirmed" => {
                payload::<DonationData>(&data).map(|d| Self::DonationConfirmed {
                    request_id: d.request_id,
                    donation_id: d.donation_id,
                })
            }
            "donation_completed" => {
                payload::<DonationData>(&data).map(|d| Self::DonationCompleted {
                    request_id: d.request_id,
                    donation_id: d.donation_id,
                })
            }
            "new_message" => payload::<NewMessageData>(&data).map(|d| Self::NewMessage {
                conversation_id: ConversationId::new(d.conversation_id),
                sender_email: d.sender_email,
                sender_name: d.sender_name,
            }),
            "welcome" => Some(Self::Welcome),
            "request_matched" => {
                payload::<RequestMatchedData>(&data).map(|d| Self::RequestMatched {
                    request_id: d.request_id,
                    donor_email: d.donor_email,
                })
            }
            _ => None,
        };

        decoded.unwrap_or_else(|| Self::Other {
            kind: kind.to_string(),
            data,
        })
    }

    /// Wire name of this kind
    pub fn type_name(&self) -> &str {
        match self {
            Self::UrgentRequest { .. } => "urgent_request",
            Self::DonationConfirmed { .. } => "donation_confirmed",
            Self::DonationCompleted { .. } => "donation_completed",
            Self::NewMessage { .. } => "new_message",
            Self::Welcome => "welcome",
            Self::RequestMatched { .. } => "request_matched",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Encode the payload back into a wire `data` object
    pub fn data(&self) -> Value {
        match self {
            Self::UrgentRequest {
                request_id,
                blood_group,
                district,
            } => json!({
                "requestId": request_id,
                "bloodGroup": blood_group,
                "district": district,
            }),
            Self::DonationConfirmed {
                request_id,
                donation_id,
            }
            | Self::DonationCompleted {
                request_id,
                donation_id,
            } => json!({ "requestId": request_id, "donationId": donation_id }),
            Self::NewMessage {
                conversation_id,
                sender_email,
                sender_name,
            } => json!({
                "conversationId": conversation_id.as_str(),
                "senderEmail": sender_email,
                "senderName": sender_name,
            }),
            Self::Welcome => Value::Null,
            Self::RequestMatched {
                request_id,
                donor_email,
            } => json!({ "requestId": request_id, "donorEmail": donor_email }),
            Self::Other { data, .. } => data.clone(),
        }
    }

    /// Navigation target for this kind, if it references an entity
    pub fn destination(&self) -> Option<Destination> {
        match self {
            Self::UrgentRequest { request_id, .. } | Self::RequestMatched { request_id, .. } => {
                Some(Destination::Request(request_id.clone()))
            }
            Self::DonationConfirmed { request_id, .. }
            | Self::DonationCompleted { request_id, .. } => {
                request_id.clone().map(Destination::Request)
            }
            Self::NewMessage {
                conversation_id, ..
            } => Some(Destination::Conversation(conversation_id.clone())),
            Self::Welcome | Self::Other { .. } => None,
        }
    }
}

/// A notification as held in the client cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireNotification", into = "WireNotification")]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        id: impl Into<NotificationId>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at,
        }
    }

    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNotification {
    #[serde(alias = "_id")]
    id: NotificationId,
    #[serde(rename = "type", default = "other_type")]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    read: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

fn other_type() -> String {
    "other".to_string()
}

impl From<WireNotification> for Notification {
    fn from(wire: WireNotification) -> Self {
        Self {
            id: wire.id,
            kind: NotificationKind::decode(&wire.kind, wire.data),
            title: wire.title,
            message: wire.message,
            read: wire.read,
            created_at: wire.created_at,
        }
    }
}

impl From<Notification> for WireNotification {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.type_name().to_string(),
            data: n.kind.data(),
            title: n.title,
            message: n.message,
            read: n.read,
            created_at: n.created_at,
        }
    }
}
