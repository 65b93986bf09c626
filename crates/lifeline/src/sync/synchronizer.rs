//! Notification synchronizer
//!
//! Keeps a local, eventually-consistent view of the user's notifications
//! and unread-message count by polling the backend on a fixed interval.
//!
//! Two states per session:
//! - **Idle**: no poll task, empty feed, disconnected.
//! - **Active**: one fetch cycle immediately, then one per interval.
//!
//! Mutations (mark read, delete, clear) are applied to the local feed
//! first and confirmed against the server in the background. A failed
//! confirmation is logged and the local change is kept; the next
//! successful poll reconciles with the server.

use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::feed::{NotificationFeed, PendingReads};
use super::timing::{NOTIFICATION_FETCH_LIMIT, NOTIFICATION_POLL_INTERVAL, NOTIFICATION_VISIBLE_LIMIT};
use crate::api::{ApiError, Backend};
use crate::models::{NotificationId, User};
use crate::session::identity_changed;

/// Tunables for the notification poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delay between fetch cycles
    pub interval: Duration,
    /// Notifications requested per fetch
    pub fetch_limit: usize,
    /// Notifications exposed through [`NotificationFeed::visible`]
    pub visible_limit: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: NOTIFICATION_POLL_INTERVAL,
            fetch_limit: NOTIFICATION_FETCH_LIMIT,
            visible_limit: NOTIFICATION_VISIBLE_LIMIT,
        }
    }
}

/// Request numbering for one polling stream
///
/// A response is applied only if it is newer than the last applied one,
/// so a slow request can't overwrite the result of a faster later one.
#[derive(Debug, Default)]
struct Sequence {
    issued: u64,
    applied: u64,
}

impl Sequence {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    epoch: u64,
    seq: u64,
}

#[derive(Default)]
struct Control {
    active: bool,
    /// Bumped on every activate/deactivate; results from older epochs are dropped
    epoch: u64,
    poll_task: Option<JoinHandle<()>>,
    notifications: Sequence,
    message_count: Sequence,
    pending: PendingReads,
}

struct Inner {
    backend: Arc<dyn Backend>,
    options: SyncOptions,
    feed: watch::Sender<NotificationFeed>,
    control: Mutex<Control>,
}

/// Handle to the notification synchronizer
///
/// Cheap to clone; all clones drive the same feed.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    pub fn new(backend: Arc<dyn Backend>, options: SyncOptions) -> Self {
        let feed = watch::Sender::new(NotificationFeed::new(options.visible_limit));
        Self {
            inner: Arc::new(Inner {
                backend,
                options,
                feed,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Read model ===

    /// Current feed contents
    pub fn snapshot(&self) -> NotificationFeed {
        self.inner.feed.borrow().clone()
    }

    /// Observe feed changes
    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.inner.feed.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.control().active
    }

    // === Lifecycle ===

    /// Enter the Active state: fetch now, then every interval
    ///
    /// Must be called from within a tokio runtime. No-op when already active.
    pub fn activate(&self) {
        let mut control = self.control();
        if control.active {
            return;
        }

        control.active = true;
        control.epoch += 1;

        let this = self.clone();
        let period = self.inner.options.interval;
        control.poll_task = Some(tokio::spawn(async move { this.poll(period).await }));

        info!(
            "Notification sync started (every {}s)",
            period.as_secs_f32()
        );
    }

    /// Enter the Idle state
    ///
    /// Cancels the poll, clears the feed and discards any response still in
    /// flight, all before returning.
    pub fn deactivate(&self) {
        let mut control = self.control();
        if let Some(task) = control.poll_task.take() {
            task.abort();
        }

        let was_active = control.active;
        control.active = false;
        control.epoch += 1;
        control.pending = PendingReads::default();

        self.inner.feed.send_if_modified(|feed| {
            let before = feed.clone();
            feed.reset();
            *feed != before
        });

        if was_active {
            info!("Notification sync stopped");
        }
    }

    /// Drive the lifecycle from session changes
    ///
    /// Activates while a user is signed in and deactivates on sign-out.
    /// Switching directly between users restarts the sync so no data
    /// carries over. The task ends (deactivating) when the session is dropped.
    pub fn attach(&self, mut session: watch::Receiver<Option<User>>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut current: Option<User> = None;
            loop {
                let user = session.borrow_and_update().clone();
                if identity_changed(current.as_ref(), user.as_ref()) {
                    this.deactivate();
                    if user.is_some() {
                        this.activate();
                    }
                }
                current = user;

                if session.changed().await.is_err() {
                    break;
                }
            }
            this.deactivate();
        })
    }

    async fn poll(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.refresh_notifications().await;
        }
    }

    // === Fetching ===

    /// Fetch both streams now, outside the timer cadence
    ///
    /// Doesn't reset or reschedule the poll.
    pub async fn refresh_notifications(&self) {
        tokio::join!(self.fetch_notifications(), self.fetch_message_unread_count());
    }

    fn issue(&self, stream: fn(&mut Control) -> &mut Sequence) -> Option<Ticket> {
        let mut control = self.control();
        if !control.active {
            return None;
        }
        let epoch = control.epoch;
        let seq = stream(&mut *control).issue();
        Some(Ticket { epoch, seq })
    }

    /// Replace the cached notifications with the server's latest page
    pub async fn fetch_notifications(&self) {
        let Some(ticket) = self.issue(|c| &mut c.notifications) else {
            debug!("Skipping notification fetch: sync is idle");
            return;
        };

        let result = self
            .inner
            .backend
            .list_notifications(self.inner.options.fetch_limit)
            .await;

        let mut control = self.control();
        if control.epoch != ticket.epoch {
            debug!("Discarding notification response from a previous session");
            return;
        }

        match result {
            Ok(page) => {
                if !control.notifications.accept(ticket.seq) {
                    debug!("Discarding out-of-order notification response");
                    return;
                }
                let pending = &control.pending;
                self.inner.feed.send_modify(|feed| {
                    feed.replace(page.notifications, page.unread_count, pending);
                    feed.set_connected(true);
                });
            }
            Err(e) => {
                drop(control);
                self.mark_disconnected("notifications", &e);
            }
        }
    }

    /// Refresh the unread-message counter
    pub async fn fetch_message_unread_count(&self) {
        let Some(ticket) = self.issue(|c| &mut c.message_count) else {
            debug!("Skipping unread count fetch: sync is idle");
            return;
        };

        let result = self.inner.backend.message_unread_count().await;

        let mut control = self.control();
        if control.epoch != ticket.epoch {
            debug!("Discarding unread count from a previous session");
            return;
        }

        match result {
            Ok(count) => {
                if !control.message_count.accept(ticket.seq) {
                    debug!("Discarding out-of-order unread count");
                    return;
                }
                self.inner.feed.send_modify(|feed| {
                    feed.set_message_unread(count);
                    feed.set_connected(true);
                });
            }
            Err(e) => {
                drop(control);
                self.mark_disconnected("message unread count", &e);
            }
        }
    }

    fn mark_disconnected(&self, what: &str, e: &ApiError) {
        self.inner.feed.send_if_modified(|feed| feed.set_connected(false));
        if e.is_auth() {
            // Expected while a session expires; the client handles the logout
            debug!("Fetching {} was not authorized", what);
        } else {
            warn!("Failed to fetch {}: {}", what, e);
        }
    }

    // === Mutations ===

    /// Mark one notification read
    ///
    /// The local flag flips and the counter drops before this returns; the
    /// returned handle resolves once the server has answered.
    pub fn mark_as_read(&self, id: &NotificationId) -> JoinHandle<()> {
        let epoch = {
            let mut control = self.control();
            self.inner.feed.send_if_modified(|feed| feed.mark_read(id));
            control.pending.add(id);
            control.epoch
        };

        let this = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = this.inner.backend.mark_notification_read(&id).await {
                error!("Failed to mark notification {} as read: {}", id.as_str(), e);
            }
            let mut control = this.control();
            if control.epoch == epoch {
                control.pending.release(&id);
            }
        })
    }

    /// Mark every notification read
    ///
    /// Only the notifications cached now are protected from a concurrent
    /// poll; anything that arrives before the server confirms shows up unread.
    pub fn mark_all_as_read(&self) -> JoinHandle<()> {
        let (epoch, ids) = {
            let mut control = self.control();
            let ids: Vec<NotificationId> = self
                .inner
                .feed
                .borrow()
                .notifications()
                .iter()
                .map(|n| n.id.clone())
                .collect();
            self.inner.feed.send_modify(|feed| feed.mark_all_read());
            for id in &ids {
                control.pending.add(id);
            }
            (control.epoch, ids)
        };

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.inner.backend.mark_all_notifications_read().await {
                error!("Failed to mark all notifications as read: {}", e);
            }
            let mut control = this.control();
            if control.epoch == epoch {
                for id in &ids {
                    control.pending.release(id);
                }
            }
        })
    }

    /// Remove every notification
    pub fn clear_notifications(&self) -> JoinHandle<()> {
        self.inner.feed.send_modify(|feed| feed.clear());

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.inner.backend.clear_notifications().await {
                error!("Failed to clear notifications: {}", e);
            }
        })
    }

    /// Remove one notification
    pub fn delete_notification(&self, id: &NotificationId) -> JoinHandle<()> {
        self.inner
            .feed
            .send_if_modified(|feed| feed.remove(id).is_some());

        let this = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = this.inner.backend.delete_notification(&id).await {
                error!("Failed to delete notification {}: {}", id.as_str(), e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Call, InMemoryBackend};
    use crate::models::{Notification, NotificationKind, Role};
    use chrono::Utc;

    fn notification(id: &str, read: bool) -> Notification {
        let mut n = Notification::new(id, NotificationKind::Welcome, "Title", "Body", Utc::now());
        n.read = read;
        n
    }

    fn setup(notifications: Vec<Notification>) -> (Arc<InMemoryBackend>, Synchronizer) {
        let backend = Arc::new(InMemoryBackend::new(User::new("me@x.org", "Me", Role::Donor)));
        backend.set_notifications(notifications);
        let sync = Synchronizer::new(backend.clone(), SyncOptions::default());
        (backend, sync)
    }

    #[test]
    fn test_sequence_rejects_stale() {
        let mut seq = Sequence::default();
        let first = seq.issue();
        let second = seq.issue();
        assert!(seq.accept(second));
        assert!(!seq.accept(first));
        assert!(!seq.accept(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_while_idle_is_skipped() {
        let (backend, sync) = setup(vec![notification("n1", false)]);
        sync.fetch_notifications().await;

        assert!(backend.calls().is_empty());
        assert!(sync.snapshot().notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_does_not_reschedule() {
        let (backend, sync) = setup(vec![]);
        sync.activate();
        tokio::task::yield_now().await;
        let is_list = |c: &Call| matches!(c, Call::ListNotifications { .. });
        assert_eq!(backend.count_calls(is_list), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        sync.refresh_notifications().await;
        assert_eq!(backend.count_calls(is_list), 2);

        // The scheduled tick still lands 10s after activation
        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(backend.count_calls(is_list), 3);

        sync.deactivate();
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_deactivate_is_discarded() {
        let (backend, sync) = setup(vec![notification("n1", false)]);
        sync.activate();

        let gate = backend.hold().await;
        let fetch = tokio::spawn({
            let sync = sync.clone();
            async move { sync.fetch_notifications().await }
        });
        tokio::task::yield_now().await;

        sync.deactivate();
        drop(gate);
        fetch.await.unwrap();

        let feed = sync.snapshot();
        assert!(feed.notifications().is_empty());
        assert!(!feed.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_confirmation_keeps_local_change() {
        let (backend, sync) = setup(vec![notification("n1", false), notification("n2", false)]);
        sync.activate();
        tokio::task::yield_now().await;
        assert_eq!(sync.snapshot().unread_count(), 2);

        backend.fail_next(ApiError::Status { status: 500 });
        sync.mark_as_read(&NotificationId::new("n1")).await.unwrap();

        let feed = sync.snapshot();
        assert!(feed.get(&NotificationId::new("n1")).unwrap().read);
        assert_eq!(feed.unread_count(), 1);

        // The server never recorded it, so the next poll brings it back unread
        sync.fetch_notifications().await;
        assert_eq!(sync.snapshot().unread_count(), 2);

        sync.deactivate();
    }
}
