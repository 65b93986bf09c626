//! Logging feed changes

use chrono::Utc;
use log::info;
use std::collections::HashSet;

use lifeline::{Destination, NotificationFeed, NotificationId, relative_label};

/// Logs new notifications and badge changes between feed snapshots
#[derive(Default)]
pub struct FeedReporter {
    seen: HashSet<NotificationId>,
    badge: u32,
    connected: bool,
}

impl FeedReporter {
    pub fn report(&mut self, feed: &NotificationFeed) {
        if feed.is_connected() != self.connected {
            self.connected = feed.is_connected();
            if self.connected {
                info!("Connected");
            } else {
                info!("Disconnected");
            }
        }

        // Logout empties the feed; forget what was shown
        if feed.notifications().is_empty() && !feed.is_connected() {
            self.seen.clear();
        }

        let now = Utc::now();
        for notification in feed.visible().iter().rev() {
            if !self.seen.insert(notification.id.clone()) {
                continue;
            }
            let marker = if notification.read { " " } else { "*" };
            let target = match notification.kind.destination() {
                Some(Destination::Request(id)) => format!(" -> request {}", id),
                Some(Destination::Conversation(id)) => format!(" -> conversation {}", id.as_str()),
                None => String::new(),
            };
            info!(
                "{} [{}] {}: {} ({}){}",
                marker,
                notification.kind.type_name(),
                notification.title,
                notification.message,
                relative_label(notification.created_at, now),
                target
            );
        }

        if feed.badge_count() != self.badge {
            self.badge = feed.badge_count();
            info!(
                "Unread: {} notifications, {} messages",
                feed.unread_count(),
                feed.message_unread_count()
            );
        }
    }
}
