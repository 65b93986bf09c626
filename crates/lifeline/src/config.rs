//! Client configuration
//!
//! The API origin is resolved in order of priority:
//! 1. Compile-time `LIFELINE_API_URL` (for production builds)
//! 2. `api_url` in ~/.config/lifeline/client.json
//! 3. Runtime `LIFELINE_API_URL` environment variable
//! 4. `http://localhost:3000`
//!
//! Polling cadence and limits come from the config file or defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::chat::ChatOptions;
use crate::sync::{
    CONVERSATION_POLL_INTERVAL, NOTIFICATION_FETCH_LIMIT, NOTIFICATION_POLL_INTERVAL,
    NOTIFICATION_VISIBLE_LIMIT, SyncOptions,
};

/// Config filename in the Lifeline config directory
const CONFIG_FILE: &str = "client.json";

/// Environment variable naming the API origin
const API_URL_ENV: &str = "LIFELINE_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Runtime configuration for the client core
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// API origin without a trailing slash
    pub api_url: String,
    pub notification_poll_secs: u64,
    pub conversation_poll_secs: u64,
    pub notification_limit: usize,
    pub visible_notifications: usize,
    pub request_timeout_secs: u64,
}

/// On-disk shape; every field is optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    notification_poll_secs: Option<u64>,
    conversation_poll_secs: Option<u64>,
    notification_limit: Option<usize>,
    visible_notifications: Option<usize>,
    request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            notification_poll_secs: NOTIFICATION_POLL_INTERVAL.as_secs(),
            conversation_poll_secs: CONVERSATION_POLL_INTERVAL.as_secs(),
            notification_limit: NOTIFICATION_FETCH_LIMIT,
            visible_notifications: NOTIFICATION_VISIBLE_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the build, config file and environment
    pub fn load() -> Result<Self> {
        let file = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            ConfigFile::default()
        };

        let env_url = std::env::var(API_URL_ENV).ok();
        Self::resolve(Self::from_compile_time(), file, env_url)
    }

    /// API origin embedded at compile time.
    /// Build with: LIFELINE_API_URL=https://api.example.org cargo build --release
    pub fn from_compile_time() -> Option<String> {
        option_env!("LIFELINE_API_URL")
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    /// Load configuration from a specific JSON file (env and build are ignored)
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ConfigFile = config::load_json_file(path)?;
        Self::resolve(None, file, None)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).context("Failed to parse client config JSON")?;
        Self::resolve(None, file, None)
    }

    fn resolve(compiled_url: Option<String>, file: ConfigFile, env_url: Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let api_url = compiled_url
            .or(file.api_url)
            .or(env_url.filter(|url| !url.is_empty()))
            .unwrap_or(defaults.api_url);

        Self {
            api_url,
            notification_poll_secs: file
                .notification_poll_secs
                .unwrap_or(defaults.notification_poll_secs),
            conversation_poll_secs: file
                .conversation_poll_secs
                .unwrap_or(defaults.conversation_poll_secs),
            notification_limit: file.notification_limit.unwrap_or(defaults.notification_limit),
            visible_notifications: file
                .visible_notifications
                .unwrap_or(defaults.visible_notifications),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
        }
        .validated()
    }

    /// Check values and normalize the API origin
    pub fn validated(mut self) -> Result<Self> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("API URL must use http or https: {}", self.api_url);
        }
        self.api_url = url.as_str().trim_end_matches('/').to_string();

        if self.notification_poll_secs == 0 || self.conversation_poll_secs == 0 {
            bail!("Poll intervals must be at least one second");
        }
        if self.notification_limit == 0 {
            bail!("notification_limit must be positive");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        self.visible_notifications = self.visible_notifications.min(self.notification_limit);

        Ok(self)
    }

    /// Get the default config file path (~/.config/lifeline/client.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            interval: Duration::from_secs(self.notification_poll_secs),
            fetch_limit: self.notification_limit,
            visible_limit: self.visible_notifications,
        }
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            poll_interval: Duration::from_secs(self.conversation_poll_secs),
        }
    }
}
