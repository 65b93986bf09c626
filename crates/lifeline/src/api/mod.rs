//! Remote API integration
//!
//! This module provides:
//! - The [`Backend`] trait the synchronizer and view models talk to
//! - [`ApiClient`], the HTTP implementation (bearer auth, 401 handling)
//! - [`InMemoryBackend`], a server double for tests and offline runs
//! - Response envelope types

mod backend;
mod client;
mod error;
mod memory;

pub use backend::Backend;
pub use client::ApiClient;
pub use error::ApiError;
pub use memory::{Call, InMemoryBackend};

/// API response envelope types
pub mod wire {
    use serde::{Deserialize, Serialize};

    use crate::models::{Message, Notification, User};

    /// Response from `GET /notifications`
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NotificationPage {
        #[serde(default)]
        pub notifications: Vec<Notification>,
        /// Total unread on the server, not just within this page
        #[serde(default)]
        pub unread_count: u32,
    }

    /// Response from `GET /messages/unread/count`
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UnreadCount {
        #[serde(default)]
        pub unread_count: u32,
    }

    /// Response from `GET /messages/:conversationId`
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct MessageList {
        #[serde(default)]
        pub messages: Vec<Message>,
    }

    /// Response from `GET /auth/me`, either wrapped or bare
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum CurrentUser {
        Wrapped { user: User },
        Bare(User),
    }

    impl CurrentUser {
        pub fn into_user(self) -> User {
            match self {
                Self::Wrapped { user } | Self::Bare(user) => user,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_notification_page() {
            let json = r#"{
                "notifications": [
                    {"_id":"n1","type":"welcome","title":"Welcome","message":"Hi",
                     "read":false,"createdAt":"2026-03-01T10:00:00Z"}
                ],
                "unreadCount": 27
            }"#;
            let page: NotificationPage = serde_json::from_str(json).unwrap();
            assert_eq!(page.notifications.len(), 1);
            assert_eq!(page.unread_count, 27);
        }

        #[test]
        fn test_parse_current_user_both_shapes() {
            let wrapped = r#"{"user":{"email":"a@x.org","name":"A","role":"admin"}}"#;
            let bare = r#"{"email":"a@x.org","name":"A","role":"admin"}"#;
            let a: CurrentUser = serde_json::from_str(wrapped).unwrap();
            let b: CurrentUser = serde_json::from_str(bare).unwrap();
            assert_eq!(a.into_user(), b.into_user());
        }
    }
}
