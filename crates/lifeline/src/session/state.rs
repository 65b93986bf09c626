//! Session state shared by the API client, synchronizer and app

use anyhow::Result;
use log::{error, info, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use super::TokenStore;
use crate::api::{ApiError, Backend};
use crate::models::User;

/// Handle to the current session
///
/// Cheap to clone; all clones share one state. The user is published on a
/// watch channel so observers (the notification synchronizer, views) can
/// react to sign-in and sign-out without ambient lookups.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<String>>,
    user: watch::Sender<Option<User>>,
}

impl Session {
    /// Create a session over a token store
    ///
    /// A stored token is loaded but the session stays absent until the
    /// token is validated with [`Session::restore`].
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let token = store.load().unwrap_or_else(|e| {
            warn!("Failed to load stored token: {}", e);
            None
        });

        Self {
            inner: Arc::new(SessionInner {
                store,
                token: RwLock::new(token),
                user: watch::Sender::new(None),
            }),
        }
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.user.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.user.borrow().is_some()
    }

    /// Observe session changes; the value is `None` while absent
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.inner.user.subscribe()
    }

    /// Establish a session after a successful login
    pub fn sign_in(&self, token: &str, user: User) -> Result<()> {
        self.inner.store.save(token)?;
        *self.inner.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        info!("Signed in as {}", user.email);
        self.inner.user.send_replace(Some(user));
        Ok(())
    }

    /// Validate a stored token and establish the session from it
    ///
    /// Returns `Ok(None)` when there is no token or the server rejects it
    /// (the token is removed in that case). Transient failures are returned
    /// as errors and leave the stored token in place for a later retry.
    pub async fn restore(&self, backend: &dyn Backend) -> Result<Option<User>, ApiError> {
        if self.token().is_none() {
            return Ok(None);
        }

        match backend.current_user().await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                self.inner.user.send_replace(Some(user.clone()));
                Ok(Some(user))
            }
            Err(e) if e.is_auth() => {
                self.force_logout();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// User-initiated logout
    pub fn sign_out(&self) {
        if self.teardown() {
            info!("Signed out");
        }
    }

    /// Logout triggered by the server rejecting the token
    pub fn force_logout(&self) {
        if self.teardown() {
            warn!("Session rejected by server, signing out");
        }
    }

    /// Remove the token and clear the user; returns whether anything changed
    fn teardown(&self) -> bool {
        let had_token = self
            .inner
            .token
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();

        if had_token && let Err(e) = self.inner.store.clear() {
            error!("Failed to remove stored token: {}", e);
        }

        let had_user = self.inner.user.send_if_modified(|user| user.take().is_some());
        had_token || had_user
    }
}

/// Whether moving from `before` to `after` signs in a different identity
///
/// Signing the same user in again (emails compare case-insensitively) is
/// not a change.
pub(crate) fn identity_changed(before: Option<&User>, after: Option<&User>) -> bool {
    match (before, after) {
        (Some(before), Some(after)) => !before.is(&after.email),
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryBackend;
    use crate::models::Role;
    use crate::session::MemoryTokenStore;

    fn donor() -> User {
        User::new("donor@example.com", "Donor", Role::Donor)
    }

    #[test]
    fn test_sign_in_and_out() {
        let store = Arc::new(MemoryTokenStore::default());
        let session = Session::new(store.clone());
        assert!(!session.is_authenticated());

        session.sign_in("jwt", donor()).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("jwt"));
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt"));

        session.sign_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_force_logout_notifies_subscribers() {
        let session = Session::new(Arc::new(MemoryTokenStore::default()));
        let mut rx = session.subscribe();
        session.sign_in("jwt", donor()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_some());

        session.force_logout();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());

        // A second teardown is a no-op
        session.force_logout();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let session = Session::new(Arc::new(MemoryTokenStore::new(Some("jwt".into()))));
        let backend = InMemoryBackend::new(donor());

        let user = session.restore(&backend).await.unwrap();
        assert_eq!(user, Some(donor()));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_with_rejected_token() {
        let store = Arc::new(MemoryTokenStore::new(Some("stale".into())));
        let session = Session::new(store.clone());
        let backend = InMemoryBackend::new(donor());
        backend.fail_next(ApiError::Unauthorized);

        assert_eq!(session.restore(&backend).await, Ok(None));
        assert!(!session.is_authenticated());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_transient_failure_keeps_token() {
        let session = Session::new(Arc::new(MemoryTokenStore::new(Some("jwt".into()))));
        let backend = InMemoryBackend::new(donor());
        backend.fail_next(ApiError::Status { status: 503 });

        assert_eq!(
            session.restore(&backend).await,
            Err(ApiError::Status { status: 503 })
        );
        assert!(!session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn test_restore_without_token_skips_request() {
        let session = Session::new(Arc::new(MemoryTokenStore::default()));
        let backend = InMemoryBackend::new(donor());

        assert_eq!(session.restore(&backend).await, Ok(None));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_identity_changed() {
        let upper = User::new("Donor@Example.com", "Donor", Role::Donor);
        let other = User::new("volunteer@example.com", "Volunteer", Role::Volunteer);

        assert!(!identity_changed(None, None));
        assert!(identity_changed(None, Some(&upper)));
        assert!(identity_changed(Some(&upper), None));
        assert!(!identity_changed(Some(&donor()), Some(&upper)));
        assert!(identity_changed(Some(&donor()), Some(&other)));
    }
}
