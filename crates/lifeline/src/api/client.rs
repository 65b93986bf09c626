//! HTTP client for the Lifeline REST API
//!
//! Attaches the session's bearer token to every request and forces a
//! logout when any request comes back 401. Uses synchronous HTTP (ureq);
//! the [`Backend`] impl moves each call onto tokio's blocking pool.

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::wire::{CurrentUser, MessageList, NotificationPage, UnreadCount};
use super::{ApiError, Backend};
use crate::config::ClientConfig;
use crate::models::{Conversation, ConversationId, Message, NewMessage, NotificationId, User};
use crate::session::Session;

/// Lifeline API client
#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// Create a client for the configured API origin
    pub fn new(config: &ClientConfig, session: Session) -> Self {
        Self::with_timeout(&config.api_url, config.request_timeout(), session)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration, session: Session) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session
            .token()
            .map(|token| format!("Bearer {}", token))
            .ok_or(ApiError::NotSignedIn)
    }

    /// Map a ureq outcome onto the API error taxonomy
    ///
    /// A 401 from any endpoint tears the session down before the error is
    /// returned to the caller.
    fn check<T>(&self, method: &str, path: &str, result: Result<T, ureq::Error>) -> Result<T, ApiError> {
        match result {
            Ok(value) => Ok(value),
            Err(ureq::Error::StatusCode(401)) => {
                debug!("{} {} rejected with 401", method, path);
                self.session.force_logout();
                Err(ApiError::Unauthorized)
            }
            Err(ureq::Error::StatusCode(status)) => Err(ApiError::Status { status }),
            Err(e) => Err(ApiError::Transport(e.to_string())),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let auth = self.bearer()?;
        let mut response = self.check(
            "GET",
            path,
            self.agent
                .get(&self.url(path))
                .header("Authorization", &auth)
                .call(),
        )?;

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let auth = self.bearer()?;
        let mut response = self.check(
            "POST",
            path,
            self.agent
                .post(&self.url(path))
                .header("Authorization", &auth)
                .send_json(body),
        )?;

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn patch(&self, path: &str) -> Result<(), ApiError> {
        let auth = self.bearer()?;
        self.check(
            "PATCH",
            path,
            self.agent
                .patch(&self.url(path))
                .header("Authorization", &auth)
                .send_empty(),
        )?;
        Ok(())
    }

    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        let auth = self.bearer()?;
        self.check(
            "DELETE",
            path,
            self.agent
                .delete(&self.url(path))
                .header("Authorization", &auth)
                .call(),
        )?;
        Ok(())
    }

    // === Endpoints ===

    pub fn fetch_current_user(&self) -> Result<User, ApiError> {
        self.get_json::<CurrentUser>("/auth/me").map(CurrentUser::into_user)
    }

    pub fn fetch_notifications(&self, limit: usize) -> Result<NotificationPage, ApiError> {
        self.get_json(&format!("/notifications?limit={}", limit))
    }

    pub fn fetch_message_unread_count(&self) -> Result<u32, ApiError> {
        self.get_json::<UnreadCount>("/messages/unread/count")
            .map(|c| c.unread_count)
    }

    pub fn patch_notification_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.patch(&format!("/notifications/{}/read", urlencoding::encode(id.as_str())))
    }

    pub fn patch_all_notifications_read(&self) -> Result<(), ApiError> {
        self.patch("/notifications/read-all")
    }

    pub fn delete_all_notifications(&self) -> Result<(), ApiError> {
        self.delete("/notifications")
    }

    pub fn delete_notification_by_id(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.delete(&format!("/notifications/{}", urlencoding::encode(id.as_str())))
    }

    pub fn fetch_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json("/conversations")
    }

    pub fn fetch_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        self.get_json::<MessageList>(&format!(
            "/messages/{}",
            urlencoding::encode(conversation_id.as_str())
        ))
        .map(|list| list.messages)
    }

    pub fn post_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
        self.post_json("/messages", message)
    }

    /// Run a blocking request on tokio's blocking pool
    async fn blocking<T, F>(&self, request: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ApiClient) -> Result<T, ApiError> + Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || request(&client))
            .await
            .map_err(|e| ApiError::Transport(format!("Request task failed: {}", e)))?
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        self.blocking(|c| c.fetch_current_user()).await
    }

    async fn list_notifications(&self, limit: usize) -> Result<NotificationPage, ApiError> {
        self.blocking(move |c| c.fetch_notifications(limit)).await
    }

    async fn message_unread_count(&self) -> Result<u32, ApiError> {
        self.blocking(|c| c.fetch_message_unread_count()).await
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        let id = id.clone();
        self.blocking(move |c| c.patch_notification_read(&id)).await
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.blocking(|c| c.patch_all_notifications_read()).await
    }

    async fn clear_notifications(&self) -> Result<(), ApiError> {
        self.blocking(|c| c.delete_all_notifications()).await
    }

    async fn delete_notification(&self, id: &NotificationId) -> Result<(), ApiError> {
        let id = id.clone();
        self.blocking(move |c| c.delete_notification_by_id(&id)).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.blocking(|c| c.fetch_conversations()).await
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let conversation_id = conversation_id.clone();
        self.blocking(move |c| c.fetch_messages(&conversation_id)).await
    }

    async fn send_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
        let message = message.clone();
        self.blocking(move |c| c.post_message(&message)).await
    }
}
