//! Read model for the messages screen

use crate::models::{Conversation, ConversationId, Message};

/// Conversations, the open thread and its busy flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
    messages: Vec<Message>,
    loading: bool,
    sending: bool,
}

impl ChatState {
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn selected(&self) -> Option<&ConversationId> {
        self.selected.as_ref()
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.as_ref().and_then(|id| self.conversation(id))
    }

    pub fn is_open(&self, id: &ConversationId) -> bool {
        self.selected.as_ref() == Some(id)
    }

    /// Messages of the open conversation, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A send is in flight
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Unread messages summed over all conversations
    pub fn total_unread(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    // === Mutations (view model only) ===

    pub(crate) fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Change the open conversation; the thread is emptied when it changes
    pub(crate) fn select(&mut self, id: Option<ConversationId>) {
        if self.selected != id {
            self.messages.clear();
        }
        self.selected = id;
        self.loading = false;
        self.sending = false;
    }

    /// Replace the thread and zero the conversation's unread counter
    pub(crate) fn replace_messages(&mut self, id: &ConversationId, messages: Vec<Message>) {
        self.messages = messages;
        if let Some(conversation) = self.conversations.iter_mut().find(|c| &c.id == id) {
            conversation.unread_count = 0;
        }
    }

    /// Record a message the server accepted
    ///
    /// Appends to the open thread unless a poll already delivered it, and
    /// updates the conversation preview.
    pub(crate) fn record_sent(&mut self, message: &Message) {
        if self.is_open(&message.conversation_id) && !self.messages.iter().any(|m| m.id == message.id) {
            self.messages.push(message.clone());
        }

        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        {
            conversation.last_message = Some(message.content.clone());
            conversation.last_message_at = Some(message.created_at);
        }
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn set_sending(&mut self, sending: bool) {
        self.sending = sending;
    }
}
