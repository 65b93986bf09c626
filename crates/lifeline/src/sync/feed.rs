//! Local notification cache
//!
//! [`NotificationFeed`] is the read model published by the synchronizer.
//! Its mutators are crate-private: views read it, and every change goes
//! through the synchronizer's operations.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Notification, NotificationId};

/// Mark-read requests that the server hasn't confirmed yet
///
/// While an id is pending, a poll result must not flip it back to unread.
/// A read-all registers the ids cached when it was issued, so a
/// notification that arrives while it is in flight stays unread.
#[derive(Debug, Default)]
pub(crate) struct PendingReads {
    ids: HashMap<NotificationId, usize>,
}

impl PendingReads {
    pub(crate) fn add(&mut self, id: &NotificationId) {
        *self.ids.entry(id.clone()).or_default() += 1;
    }

    pub(crate) fn release(&mut self, id: &NotificationId) {
        if let Some(count) = self.ids.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.ids.remove(id);
            }
        }
    }

    fn covers(&self, id: &NotificationId) -> bool {
        self.ids.contains_key(id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Snapshot of the user's notifications and unread counters
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFeed {
    notifications: Vec<Notification>,
    unread_count: u32,
    message_unread_count: u32,
    connected: bool,
    last_synced_at: Option<DateTime<Utc>>,
    visible_limit: usize,
}

impl NotificationFeed {
    pub(crate) fn new(visible_limit: usize) -> Self {
        Self {
            notifications: Vec::new(),
            unread_count: 0,
            message_unread_count: 0,
            connected: false,
            last_synced_at: None,
            visible_limit,
        }
    }

    /// All cached notifications, newest first
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// The notifications a list view should render
    pub fn visible(&self) -> &[Notification] {
        let end = self.notifications.len().min(self.visible_limit);
        &self.notifications[..end]
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    /// Unread notifications as last reported by the server, adjusted by
    /// local optimistic changes
    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn message_unread_count(&self) -> u32 {
        self.message_unread_count
    }

    /// Combined badge value for the notification bell
    pub fn badge_count(&self) -> u32 {
        self.unread_count.saturating_add(self.message_unread_count)
    }

    /// Unread notifications within the cached list
    ///
    /// Can be lower than [`unread_count`](Self::unread_count) right after a
    /// fetch, since the server counts beyond the fetched page.
    pub fn computed_unread(&self) -> u32 {
        self.notifications.iter().filter(|n| n.is_unread()).count() as u32
    }

    /// Whether the most recent fetch succeeded
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// When the notification list was last replaced from the server
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    // === Mutations (synchronizer only) ===

    /// Replace the list and count wholesale with a server response
    pub(crate) fn replace(
        &mut self,
        mut notifications: Vec<Notification>,
        server_unread: u32,
        pending: &PendingReads,
    ) {
        let mut flipped = 0u32;
        if !pending.is_empty() {
            for n in notifications.iter_mut().filter(|n| n.is_unread()) {
                if pending.covers(&n.id) {
                    n.read = true;
                    flipped += 1;
                }
            }
        }

        self.notifications = notifications;
        self.unread_count = server_unread.saturating_sub(flipped);
        self.last_synced_at = Some(Utc::now());
    }

    pub(crate) fn set_message_unread(&mut self, count: u32) {
        self.message_unread_count = count;
    }

    pub(crate) fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }

    /// Flip one notification to read; returns whether anything changed
    pub(crate) fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.notifications.iter_mut().find(|n| &n.id == id) {
            Some(n) if n.is_unread() => {
                n.read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_all_read(&mut self) {
        for n in self.notifications.iter_mut() {
            n.read = true;
        }
        self.unread_count = 0;
    }

    pub(crate) fn clear(&mut self) {
        self.notifications.clear();
        self.unread_count = 0;
    }

    /// Remove one notification, adjusting the counter if it was unread
    pub(crate) fn remove(&mut self, id: &NotificationId) -> Option<Notification> {
        let index = self.notifications.iter().position(|n| &n.id == id)?;
        let removed = self.notifications.remove(index);
        if removed.is_unread() {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        Some(removed)
    }

    /// Back to the idle state: nothing cached, nothing connected
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.visible_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    fn notification(id: &str, read: bool) -> Notification {
        let mut n = Notification::new(id, NotificationKind::Welcome, "Title", "Body", Utc::now());
        n.read = read;
        n
    }

    fn feed_with(states: &[bool]) -> NotificationFeed {
        let mut feed = NotificationFeed::new(15);
        let list: Vec<_> = states
            .iter()
            .enumerate()
            .map(|(i, read)| notification(&format!("n{}", i + 1), *read))
            .collect();
        let unread = states.iter().filter(|r| !**r).count() as u32;
        feed.replace(list, unread, &PendingReads::default());
        feed
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut feed = feed_with(&[false, false, true]);
        feed.replace(vec![notification("x", false)], 40, &PendingReads::default());

        assert_eq!(feed.notifications().len(), 1);
        assert_eq!(feed.notifications()[0].id.as_str(), "x");
        // The server count wins even though only one unread is cached
        assert_eq!(feed.unread_count(), 40);
        assert_eq!(feed.computed_unread(), 1);
        assert!(feed.last_synced_at().is_some());
    }

    #[test]
    fn test_mark_read_decrements_once() {
        let mut feed = feed_with(&[false, false, false]);
        let id = NotificationId::new("n1");

        assert!(feed.mark_read(&id));
        assert!(!feed.mark_read(&id));
        assert_eq!(feed.unread_count(), 2);
        assert!(feed.get(&id).unwrap().read);
    }

    #[test]
    fn test_mark_read_unknown_id_is_noop() {
        let mut feed = feed_with(&[false]);
        assert!(!feed.mark_read(&NotificationId::new("missing")));
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn test_remove_unread_vs_read() {
        let mut feed = feed_with(&[false, true, false]);

        feed.remove(&NotificationId::new("n2"));
        assert_eq!(feed.unread_count(), 2);

        feed.remove(&NotificationId::new("n1"));
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.notifications().len(), 1);
    }

    #[test]
    fn test_counter_never_goes_negative() {
        let mut feed = NotificationFeed::new(15);
        // Server says zero unread but the cached item is unread
        feed.replace(vec![notification("n1", false)], 0, &PendingReads::default());

        feed.mark_read(&NotificationId::new("n1"));
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_unread_matches_computed_after_any_mutation_sequence() {
        let sequences: Vec<Vec<&str>> = vec![
            vec!["read n1", "read n1", "delete n2", "read n3"],
            vec!["delete n1", "read all", "delete n4"],
            vec!["read n5", "delete n5", "delete n5", "read n2"],
            vec!["read all", "read n1", "delete n3"],
            vec!["delete n2", "delete n3", "read n4", "read n1", "delete n1"],
        ];

        for ops in sequences {
            let mut feed = feed_with(&[false, false, true, false, false]);
            for op in &ops {
                match op.split_once(' ') {
                    Some(("read", "all")) => feed.mark_all_read(),
                    Some(("read", id)) => {
                        feed.mark_read(&NotificationId::new(id));
                    }
                    Some(("delete", id)) => {
                        feed.remove(&NotificationId::new(id));
                    }
                    _ => unreachable!(),
                }
                assert_eq!(
                    feed.unread_count(),
                    feed.computed_unread(),
                    "diverged after {:?} in {:?}",
                    op,
                    ops
                );
            }
        }
    }

    #[test]
    fn test_pending_read_survives_replace() {
        let mut feed = feed_with(&[false, false]);
        let mut pending = PendingReads::default();
        let id = NotificationId::new("n1");
        feed.mark_read(&id);
        pending.add(&id);

        // A poll that started before the PATCH landed still reports n1 unread
        feed.replace(vec![notification("n1", false), notification("n2", false)], 2, &pending);
        assert!(feed.get(&id).unwrap().read);
        assert_eq!(feed.unread_count(), 1);

        pending.release(&id);
        feed.replace(vec![notification("n1", false), notification("n2", false)], 2, &pending);
        assert!(!feed.get(&id).unwrap().read);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_pending_read_all_spares_later_arrivals() {
        let mut feed = feed_with(&[false, true]);
        let mut pending = PendingReads::default();
        let issued: Vec<NotificationId> = feed.notifications().iter().map(|n| n.id.clone()).collect();
        feed.mark_all_read();
        for id in &issued {
            pending.add(id);
        }

        // n3 reached the server after the read-all was sent
        let list = vec![notification("n3", false), notification("n1", false), notification("n2", true)];
        feed.replace(list, 2, &pending);
        assert!(!feed.get(&NotificationId::new("n3")).unwrap().read);
        assert!(feed.get(&NotificationId::new("n1")).unwrap().read);
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.computed_unread(), 1);

        for id in &issued {
            pending.release(id);
        }
        assert!(pending.is_empty());
    }

    #[test]
    fn test_visible_is_capped() {
        let mut feed = NotificationFeed::new(15);
        let list = (0..20).map(|i| notification(&format!("n{}", i), false)).collect();
        feed.replace(list, 20, &PendingReads::default());

        assert_eq!(feed.notifications().len(), 20);
        assert_eq!(feed.visible().len(), 15);
        assert_eq!(feed.visible()[0].id.as_str(), "n0");
    }

    #[test]
    fn test_badge_sums_both_counters() {
        let mut feed = feed_with(&[false, false]);
        feed.set_message_unread(3);
        assert_eq!(feed.badge_count(), 5);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut feed = feed_with(&[false]);
        feed.set_message_unread(4);
        feed.set_connected(true);

        feed.reset();
        assert!(feed.notifications().is_empty());
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.message_unread_count(), 0);
        assert!(!feed.is_connected());
        assert!(feed.last_synced_at().is_none());
    }
}
