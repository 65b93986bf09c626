//! Durable token storage

use anyhow::{Context, Result};
use config::{ConfigDir, KeyValueFile};
use std::path::PathBuf;
use std::sync::RwLock;

/// Key the bearer token is stored under
pub const TOKEN_KEY: &str = "access-token";

/// File backing the key/value client storage
const STORAGE_FILE: &str = "storage.json";

/// Persistence for the bearer token
pub trait TokenStore: Send + Sync {
    /// Load the stored token, if any
    fn load(&self) -> Result<Option<String>>;

    /// Persist a token, replacing any previous one
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the stored token
    fn clear(&self) -> Result<()>;
}

/// Token storage in the Lifeline config directory
pub struct FileTokenStore {
    file: KeyValueFile,
}

impl FileTokenStore {
    /// Store in the user's config dir (~/.config/lifeline/storage.json)
    pub fn user() -> Result<Self> {
        let dir = ConfigDir::user().context("Could not determine config directory")?;
        Ok(Self::in_dir(dir))
    }

    pub fn in_dir(dir: ConfigDir) -> Self {
        Self {
            file: KeyValueFile::new(dir, STORAGE_FILE),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.file.path()
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        self.file.get(TOKEN_KEY)
    }

    fn save(&self, token: &str) -> Result<()> {
        self.file.set(TOKEN_KEY, token)
    }

    fn clear(&self) -> Result<()> {
        self.file.remove(TOKEN_KEY)
    }
}

/// Process-local token storage for tests and offline runs
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileTokenStore::in_dir(ConfigDir::at(tmp.path()));

        assert_eq!(store.load().unwrap(), None);
        store.save("jwt-1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-1"));

        // A second store over the same dir sees the persisted token
        let reopened = FileTokenStore::in_dir(ConfigDir::at(tmp.path()));
        assert_eq!(reopened.load().unwrap().as_deref(), Some("jwt-1"));

        store.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new(Some("t".to_string()));
        assert_eq!(store.load().unwrap().as_deref(), Some("t"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
