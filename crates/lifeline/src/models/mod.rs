//! Domain models for notifications, conversations and messages

mod conversation;
mod message;
mod notification;
mod user;

pub use conversation::{Conversation, ConversationId, ParticipantUser};
pub use message::{Message, MessageId, NewMessage};
pub use notification::{Destination, Notification, NotificationId, NotificationKind};
pub use user::{Role, User, UserStatus};
