//! Lifeline crate - Client core for the blood-donation platform
//!
//! This crate provides the platform-independent half of the client:
//! - Domain models (User, Notification, Conversation, Message)
//! - REST API client with bearer auth and forced logout on 401
//! - Session state with token persistence and restore
//! - Notification synchronizer with optimistic mutations
//! - Conversation view model with per-conversation polling
//!
//! Rendering, routing and login screens live in the apps; nothing here
//! depends on a UI toolkit.

pub mod api;
pub mod chat;
pub mod config;
pub mod models;
pub mod session;
pub mod sync;

pub use api::{ApiClient, ApiError, Backend, Call, InMemoryBackend};
pub use chat::{ChatError, ChatOptions, ChatState, ConversationView, Participant, other_party};
pub use config::ClientConfig;
pub use models::{
    Conversation, ConversationId, Destination, Message, MessageId, NewMessage, Notification,
    NotificationId, NotificationKind, ParticipantUser, Role, User, UserStatus,
};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
pub use sync::{NotificationFeed, SyncOptions, Synchronizer, relative_label};
