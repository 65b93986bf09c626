//! In-memory backend
//!
//! Behaves like the REST API over a process-local data set. Used by the
//! test suites and by the app's offline mode. Every call is recorded, the
//! next call (or all calls) can be made to fail, and responses can be held
//! back with [`InMemoryBackend::hold`] to observe state while a request is
//! in flight.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{RwLock, RwLockWriteGuard};

use super::wire::NotificationPage;
use super::{ApiError, Backend};
use crate::models::{
    Conversation, ConversationId, Message, MessageId, NewMessage, Notification, NotificationId,
    User,
};

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    ListNotifications { limit: usize },
    MessageUnreadCount,
    MarkRead(NotificationId),
    MarkAllRead,
    ClearNotifications,
    DeleteNotification(NotificationId),
    ListConversations,
    ListMessages(ConversationId),
    SendMessage(NewMessage),
}

struct ServerState {
    user: User,
    /// Newest first
    notifications: Vec<Notification>,
    message_unread: u32,
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    message_seq: u64,
    fail_next: VecDeque<ApiError>,
    fail_all: Option<ApiError>,
    calls: Vec<Call>,
}

/// Backend over in-memory data
pub struct InMemoryBackend {
    state: Mutex<ServerState>,
    gate: RwLock<()>,
}

impl InMemoryBackend {
    /// Create an empty backend serving the given user
    pub fn new(user: User) -> Self {
        Self {
            state: Mutex::new(ServerState {
                user,
                notifications: Vec::new(),
                message_unread: 0,
                conversations: Vec::new(),
                messages: HashMap::new(),
                message_seq: 0,
                fail_next: VecDeque::new(),
                fail_all: None,
                calls: Vec::new(),
            }),
            gate: RwLock::new(()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Seeding ===

    /// Replace all notifications (newest first)
    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        self.state().notifications = notifications;
    }

    /// Add a notification as the newest
    pub fn push_notification(&self, notification: Notification) {
        self.state().notifications.insert(0, notification);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    pub fn set_message_unread(&self, count: u32) {
        self.state().message_unread = count;
    }

    pub fn add_conversation(&self, conversation: Conversation) {
        self.state().conversations.push(conversation);
    }

    /// Append an existing message to its conversation
    pub fn add_message(&self, message: Message) {
        let mut state = self.state();
        state.message_seq += 1;
        state
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.state()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    // === Failure injection ===

    /// Fail the next call with the given error
    pub fn fail_next(&self, error: ApiError) {
        self.state().fail_next.push_back(error);
    }

    /// Fail every call until cleared with `None`
    pub fn fail_all(&self, error: Option<ApiError>) {
        self.state().fail_all = error;
    }

    /// Hold every response until the returned guard is dropped
    ///
    /// Calls are still recorded while held, so tests can observe that a
    /// request was issued before it resolves.
    pub async fn hold(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    // === Call log ===

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record the call, wait for the gate, then apply any injected failure
    async fn begin(&self, call: Call) -> Result<(), ApiError> {
        self.state().calls.push(call);
        let _open = self.gate.read().await;

        let mut state = self.state();
        if let Some(error) = state.fail_next.pop_front() {
            return Err(error);
        }
        match &state.fail_all {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.begin(Call::CurrentUser).await?;
        Ok(self.state().user.clone())
    }

    async fn list_notifications(&self, limit: usize) -> Result<NotificationPage, ApiError> {
        self.begin(Call::ListNotifications { limit }).await?;
        let state = self.state();
        let unread_count = state.notifications.iter().filter(|n| !n.read).count() as u32;
        Ok(NotificationPage {
            notifications: state.notifications.iter().take(limit).cloned().collect(),
            unread_count,
        })
    }

    async fn message_unread_count(&self) -> Result<u32, ApiError> {
        self.begin(Call::MessageUnreadCount).await?;
        Ok(self.state().message_unread)
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.begin(Call::MarkRead(id.clone())).await?;
        let mut state = self.state();
        match state.notifications.iter_mut().find(|n| &n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(())
            }
            None => Err(ApiError::Status { status: 404 }),
        }
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.begin(Call::MarkAllRead).await?;
        for n in self.state().notifications.iter_mut() {
            n.read = true;
        }
        Ok(())
    }

    async fn clear_notifications(&self) -> Result<(), ApiError> {
        self.begin(Call::ClearNotifications).await?;
        self.state().notifications.clear();
        Ok(())
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.begin(Call::DeleteNotification(id.clone())).await?;
        let mut state = self.state();
        let before = state.notifications.len();
        state.notifications.retain(|n| &n.id != id);
        if state.notifications.len() == before {
            return Err(ApiError::Status { status: 404 });
        }
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.begin(Call::ListConversations).await?;
        Ok(self.state().conversations.clone())
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        self.begin(Call::ListMessages(conversation_id.clone())).await?;
        let mut messages = self.messages(conversation_id);
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn send_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
        self.begin(Call::SendMessage(message.clone())).await?;
        let mut state = self.state();

        let Some(conversation) = state
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        else {
            return Err(ApiError::Status { status: 404 });
        };

        let now = Utc::now();
        conversation.last_message = Some(message.content.clone());
        conversation.last_message_at = Some(now);

        state.message_seq += 1;
        let stored = Message {
            id: MessageId::new(format!("m{}", state.message_seq)),
            conversation_id: message.conversation_id.clone(),
            sender_email: state.user.email.clone(),
            receiver_email: message.receiver_email.clone(),
            content: message.content.clone(),
            created_at: now,
            read: false,
        };
        state
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }
}
