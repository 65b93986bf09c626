//! Conversation view model
//!
//! Presents the user's conversations and one open thread. Only the open
//! conversation is polled; opening another one or closing the view
//! cancels the previous poll before anything else happens. Attached to a
//! session, the view starts over whenever the signed-in user goes away or
//! changes.

use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::participants::{Participant, other_party};
use super::state::ChatState;
use crate::api::{ApiError, Backend};
use crate::models::{ConversationId, Message, NewMessage, User};
use crate::session::identity_changed;
use crate::sync::CONVERSATION_POLL_INTERVAL;

/// Errors surfaced to the user when sending
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Conversation is not open")]
    NoOpenConversation,
    #[error("Conversation has no other participant")]
    NoRecipient,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Tunables for the open-conversation poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub poll_interval: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            poll_interval: CONVERSATION_POLL_INTERVAL,
        }
    }
}

struct Control {
    own_email: String,
    poll_task: Option<JoinHandle<()>>,
    /// Bumped on every open/close; message results from older selections are dropped
    selection: u64,
    /// Bumped when the session ends or changes user; older conversation lists are dropped
    generation: u64,
}

struct Inner {
    backend: Arc<dyn Backend>,
    options: ChatOptions,
    state: watch::Sender<ChatState>,
    control: Mutex<Control>,
}

/// Handle to the conversation view model
#[derive(Clone)]
pub struct ConversationView {
    inner: Arc<Inner>,
}

impl ConversationView {
    /// Create a view model for the signed-in user
    pub fn new(backend: Arc<dyn Backend>, own_email: impl Into<String>, options: ChatOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                options,
                state: watch::Sender::new(ChatState::default()),
                control: Mutex::new(Control {
                    own_email: own_email.into(),
                    poll_task: None,
                    selection: 0,
                    generation: 0,
                }),
            }),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ChatState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.inner.state.subscribe()
    }

    /// Whether a message poll is scheduled
    pub fn is_polling(&self) -> bool {
        self.control()
            .poll_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Email of the user the view is presented for
    pub fn own_email(&self) -> String {
        self.control().own_email.clone()
    }

    /// The other participant of a conversation, from this user's side
    pub fn other_party(&self, conversation_id: &ConversationId) -> Option<Participant> {
        let own_email = self.own_email();
        let state = self.inner.state.borrow();
        let conversation = state.conversation(conversation_id)?;
        other_party(conversation, &own_email)
    }

    // === Session ===

    /// Follow session changes
    ///
    /// Sign-out, a forced logout or a switch to another user closes the open
    /// conversation and empties the view before anything else runs. The
    /// current session is applied before this returns. The task ends
    /// (resetting the view) when the session is dropped.
    pub fn attach(&self, mut session: watch::Receiver<Option<User>>) -> JoinHandle<()> {
        let mut current = session.borrow_and_update().clone();
        match &current {
            Some(user) if user.is(&self.own_email()) => {}
            user => self.reset(user.as_ref()),
        }

        let this = self.clone();
        tokio::spawn(async move {
            while session.changed().await.is_ok() {
                let user = session.borrow_and_update().clone();
                if identity_changed(current.as_ref(), user.as_ref()) {
                    this.reset(user.as_ref());
                }
                current = user;
            }
            this.reset(None);
        })
    }

    /// Drop everything shown for the previous user
    fn reset(&self, user: Option<&User>) {
        let mut control = self.control();
        if let Some(task) = control.poll_task.take() {
            task.abort();
        }
        control.selection += 1;
        control.generation += 1;
        if let Some(user) = user {
            control.own_email = user.email.clone();
        }

        self.inner.state.send_if_modified(|state| {
            let before = std::mem::take(state);
            *state != before
        });
        debug!("Conversation view reset");
    }

    // === Conversations ===

    /// Replace the conversation list with the server's
    pub async fn fetch_conversations(&self) -> Result<(), ApiError> {
        let generation = self.control().generation;
        let result = self.inner.backend.list_conversations().await;

        let control = self.control();
        if control.generation != generation {
            debug!("Discarding conversations from a previous session");
            return result.map(|_| ());
        }

        match result {
            Ok(conversations) => {
                debug!("Loaded {} conversations", conversations.len());
                self.inner
                    .state
                    .send_modify(|state| state.replace_conversations(conversations));
                Ok(())
            }
            Err(e) => {
                log_fetch_failure("conversations", &e);
                Err(e)
            }
        }
    }

    // === Selection ===

    /// Open a conversation: load its messages, then keep polling it
    ///
    /// The previous conversation's poll is cancelled before this returns
    /// its first await.
    pub async fn open(&self, id: ConversationId) -> Result<(), ApiError> {
        self.switch_to(Some(id.clone()));
        self.fetch_messages(&id, false).await.map(|_| ())
    }

    /// Change the selection; `None` closes the open conversation
    pub async fn select(&self, id: Option<ConversationId>) -> Result<(), ApiError> {
        match id {
            Some(id) => self.open(id).await,
            None => {
                self.close();
                Ok(())
            }
        }
    }

    /// Close the open conversation, leaving no poll scheduled
    pub fn close(&self) {
        self.switch_to(None);
    }

    fn switch_to(&self, id: Option<ConversationId>) {
        let mut control = self.control();
        if let Some(task) = control.poll_task.take() {
            task.abort();
        }
        control.selection += 1;
        self.inner.state.send_modify(|state| state.select(id.clone()));

        if let Some(id) = id {
            info!("Opened conversation {}", id.as_str());
            let this = self.clone();
            let period = self.inner.options.poll_interval;
            control.poll_task = Some(tokio::spawn(async move { this.poll(id, period).await }));
        }
    }

    async fn poll(self, id: ConversationId, period: Duration) {
        // The first load happens in `open`, so the first tick is one period out
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let _ = self.fetch_messages(&id, true).await;
        }
    }

    // === Messages ===

    /// Replace the open thread with the server's messages
    ///
    /// Zeroes the conversation's unread counter. `silent` skips the loading
    /// flag (used by the background poll). Returns `Ok(false)` when nothing
    /// was applied: a conversation that isn't open is not fetched at all, and
    /// a response that arrives after the user moved on is dropped.
    pub async fn fetch_messages(&self, id: &ConversationId, silent: bool) -> Result<bool, ApiError> {
        let selection = {
            let control = self.control();
            let is_open = self.inner.state.borrow().is_open(id);
            if !is_open {
                debug!("Not fetching messages for conversation {}: not open", id.as_str());
                return Ok(false);
            }
            if !silent {
                self.inner.state.send_modify(|state| state.set_loading(true));
            }
            control.selection
        };

        let result = self.inner.backend.list_messages(id).await;

        let control = self.control();
        if control.selection != selection {
            // The loading flag now belongs to the newer selection
            debug!("Discarding messages for conversation {}: no longer open", id.as_str());
            return result.map(|_| false);
        }

        match result {
            Ok(messages) => {
                self.inner.state.send_modify(|state| {
                    state.replace_messages(id, messages);
                    state.set_loading(false);
                });
                Ok(true)
            }
            Err(e) => {
                if !silent {
                    self.inner.state.send_modify(|state| state.set_loading(false));
                }
                log_fetch_failure("messages", &e);
                Err(e)
            }
        }
    }

    /// Send a message in an open conversation
    ///
    /// Blank content and closed conversations are rejected before any
    /// request. Nothing is added to the thread until the server has
    /// accepted the message.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        receiver_email: &str,
        content: &str,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let is_open = self.inner.state.borrow().is_open(conversation_id);
        if !is_open {
            return Err(ChatError::NoOpenConversation);
        }

        let request = NewMessage {
            conversation_id: conversation_id.clone(),
            receiver_email: receiver_email.to_string(),
            content: content.to_string(),
        };

        self.inner.state.send_modify(|state| state.set_sending(true));
        let result = self.inner.backend.send_message(&request).await;

        match result {
            Ok(message) => {
                self.inner.state.send_modify(|state| {
                    state.record_sent(&message);
                    state.set_sending(false);
                });
                Ok(message)
            }
            Err(e) => {
                self.inner.state.send_modify(|state| state.set_sending(false));
                error!(
                    "Failed to send message in conversation {}: {}",
                    conversation_id.as_str(),
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Send to the other party of the open conversation
    pub async fn reply(&self, content: &str) -> Result<Message, ChatError> {
        let selected = self.inner.state.borrow().selected().cloned();
        let id = selected.ok_or(ChatError::NoOpenConversation)?;
        let receiver = self.other_party(&id).ok_or(ChatError::NoRecipient)?;
        self.send_message(&id, &receiver.email, content).await
    }
}

fn log_fetch_failure(what: &str, e: &ApiError) {
    if e.is_auth() {
        debug!("Fetching {} was not authorized", what);
    } else {
        warn!("Failed to fetch {}: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Call, InMemoryBackend};
    use crate::models::{Conversation, Role, User};

    fn setup() -> (Arc<InMemoryBackend>, ConversationView) {
        let backend = Arc::new(InMemoryBackend::new(User::new("me@x.org", "Me", Role::Donor)));
        backend.add_conversation(Conversation::new("c1", "me@x.org", "you@x.org"));
        backend.add_conversation(Conversation::new("c2", "me@x.org", "them@x.org"));
        let view = ConversationView::new(backend.clone(), "me@x.org", ChatOptions::default());
        (backend, view)
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_message_sends_nothing() {
        let (backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();
        backend.clear_calls();

        let result = view.send_message(&ConversationId::new("c1"), "you@x.org", "  \n\t ").await;
        assert_eq!(result, Err(ChatError::EmptyMessage));
        assert!(backend.calls().is_empty());
        assert!(view.snapshot().messages().is_empty());
        view.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_conversation() {
        let (backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        backend.clear_calls();

        let result = view.send_message(&ConversationId::new("c1"), "you@x.org", "hi").await;
        assert_eq!(result, Err(ChatError::NoOpenConversation));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_is_trimmed() {
        let (backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();

        let sent = view.reply("  hello  ").await.unwrap();
        assert_eq!(sent.content, "hello");
        assert_eq!(sent.receiver_email, "you@x.org");
        assert_eq!(
            backend.count_calls(|c| matches!(c, Call::SendMessage(m) if m.content == "hello")),
            1
        );
        view.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sending_flag_while_in_flight() {
        let (backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();

        let gate = backend.hold().await;
        let send = tokio::spawn({
            let view = view.clone();
            async move { view.reply("on my way").await }
        });
        tokio::task::yield_now().await;
        assert!(view.snapshot().is_sending());

        drop(gate);
        send.await.unwrap().unwrap();
        assert!(!view.snapshot().is_sending());
        view.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_polling() {
        let (_backend, view) = setup();
        view.open(ConversationId::new("c1")).await.unwrap();
        assert!(view.is_polling());

        view.select(None).await.unwrap();
        assert!(!view.is_polling());
        assert_eq!(view.snapshot().selected(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_for_unopened_conversation_is_skipped() {
        let (backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();
        backend.clear_calls();

        let c2 = ConversationId::new("c2");
        assert_eq!(view.fetch_messages(&c2, false).await, Ok(false));
        assert!(!view.snapshot().is_loading());
        assert!(backend.calls().is_empty());

        assert_eq!(view.fetch_messages(&ConversationId::new("c1"), false).await, Ok(true));
        assert!(!view.snapshot().is_loading());
        view.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_reports_not_applied() {
        let (backend, view) = setup();
        view.open(ConversationId::new("c1")).await.unwrap();

        let gate = backend.hold().await;
        let fetch = tokio::spawn({
            let view = view.clone();
            async move { view.fetch_messages(&ConversationId::new("c1"), true).await }
        });
        tokio::task::yield_now().await;

        view.close();
        drop(gate);
        assert_eq!(fetch.await.unwrap(), Ok(false));
        assert!(!view.snapshot().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_while_signed_out_empties_view() {
        let (_backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();

        let (_tx, rx) = watch::channel(None);
        let attached = view.attach(rx);
        assert!(!view.is_polling());
        assert_eq!(view.snapshot(), ChatState::default());
        attached.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_for_same_user_keeps_view() {
        let (_backend, view) = setup();
        view.fetch_conversations().await.unwrap();
        view.open(ConversationId::new("c1")).await.unwrap();

        let (tx, rx) = watch::channel(Some(User::new("ME@x.org", "Me", Role::Donor)));
        let attached = view.attach(rx);
        assert!(view.is_polling());
        assert_eq!(view.snapshot().conversations().len(), 2);

        drop(tx);
        attached.await.unwrap();
        assert!(!view.is_polling());
        assert!(view.snapshot().conversations().is_empty());
    }
}
