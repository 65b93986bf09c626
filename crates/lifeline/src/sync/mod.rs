//! Notification synchronizer
//!
//! Polls the backend for notifications and the unread-message count and
//! keeps a local feed that views read from.

mod feed;
mod synchronizer;
mod timing;

pub use feed::NotificationFeed;
pub use synchronizer::{SyncOptions, Synchronizer};
pub use timing::{
    CONVERSATION_POLL_INTERVAL, NOTIFICATION_FETCH_LIMIT, NOTIFICATION_POLL_INTERVAL,
    NOTIFICATION_VISIBLE_LIMIT, relative_label,
};
