//! Backend trait definition

use async_trait::async_trait;

use super::ApiError;
use super::wire::NotificationPage;
use crate::models::{Conversation, ConversationId, Message, NewMessage, NotificationId, User};

/// Remote operations consumed by the client core
///
/// This trait abstracts over the transport so the synchronizer and the
/// conversation view model can run against the HTTP client, an in-memory
/// double, or a push-based transport with the same behaviour.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolve the identity behind the current token
    async fn current_user(&self) -> Result<User, ApiError>;

    /// Most recent notifications (newest first) plus the total unread count
    async fn list_notifications(&self, limit: usize) -> Result<NotificationPage, ApiError>;

    /// Unread messages across all conversations
    async fn message_unread_count(&self) -> Result<u32, ApiError>;

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ApiError>;

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError>;

    /// Delete every notification of the current user
    async fn clear_notifications(&self) -> Result<(), ApiError>;

    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError>;

    /// All conversations of the current user
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Messages of one conversation, ordered by creation time ascending
    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ApiError>;

    /// Send a message; returns the message as stored by the server
    async fn send_message(&self, message: &NewMessage) -> Result<Message, ApiError>;
}
