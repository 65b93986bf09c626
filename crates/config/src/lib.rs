//! Configuration loading for Lifeline applications
//!
//! Provides utilities for loading and saving files in the shared Lifeline
//! config directory (~/.config/lifeline/), plus a small key/value file that
//! backs durable client storage (the bearer token lives there).
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the application directory inside the platform config dir
const APP_DIR: &str = "lifeline";

/// Initialize the Lifeline config directory.
///
/// Creates ~/.config/lifeline/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ConfigDir::user()
        .context("Could not determine config directory")?
        .ensure()
}

/// Get the Lifeline config directory (~/.config/lifeline/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the Lifeline config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the Lifeline config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    ConfigDir::user()
        .context("Could not determine config directory")?
        .load_json(filename)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the Lifeline config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Save a value as JSON to a config file in the Lifeline config directory
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<()> {
    ConfigDir::user()
        .context("Could not determine config directory")?
        .save_json(filename, value)
}

/// A directory holding Lifeline config files.
///
/// The free functions in this crate operate on the user's config dir;
/// this handle lets callers (and tests) point at any directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    /// The user's Lifeline config directory, if the platform has one
    pub fn user() -> Option<Self> {
        config_dir().map(Self::at)
    }

    /// A config directory rooted at an explicit path
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).exists()
    }

    /// Create the directory if it doesn't exist
    pub fn ensure(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create config directory: {}", self.root.display())
        })?;
        Ok(self.root.clone())
    }

    pub fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        load_json_file(&self.path(filename))
    }

    pub fn save_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<()> {
        self.ensure()?;
        let path = self.path(filename);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Remove a config file. Missing files are not an error.
    pub fn remove(&self, filename: &str) -> Result<()> {
        let path = self.path(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove config file: {}", path.display())),
        }
    }
}

/// String key/value storage persisted as a single JSON object.
///
/// Every write rewrites the whole file; values are expected to be small
/// (tokens, flags).
#[derive(Debug, Clone)]
pub struct KeyValueFile {
    dir: ConfigDir,
    filename: String,
}

impl KeyValueFile {
    pub fn new(dir: ConfigDir, filename: impl Into<String>) -> Self {
        Self {
            dir,
            filename: filename.into(),
        }
    }

    /// Full path of the backing file
    pub fn path(&self) -> PathBuf {
        self.dir.path(&self.filename)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.dir.save_json(&self.filename, &entries)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            self.dir.remove(&self.filename)
        } else {
            self.dir.save_json(&self.filename, &entries)
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.dir.exists(&self.filename) {
            return Ok(BTreeMap::new());
        }
        self.dir.load_json(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("lifeline"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("client.json").unwrap();
        assert!(path.ends_with("lifeline/client.json"));
    }

    #[test]
    fn test_save_and_load_json() {
        let tmp = TempDir::new().unwrap();
        let dir = ConfigDir::at(tmp.path().join("nested"));

        dir.save_json("values.json", &vec![1, 2, 3]).unwrap();
        let loaded: Vec<u32> = dir.load_json("values.json").unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        let dir = ConfigDir::at(tmp.path());
        assert!(dir.remove("nothing.json").is_ok());
    }

    #[test]
    fn test_key_value_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueFile::new(ConfigDir::at(tmp.path()), "storage.json");

        assert_eq!(store.get("access-token").unwrap(), None);
        store.set("access-token", "abc").unwrap();
        store.set("theme", "dark").unwrap();
        assert_eq!(store.get("access-token").unwrap().as_deref(), Some("abc"));

        store.remove("access-token").unwrap();
        assert_eq!(store.get("access-token").unwrap(), None);
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_key_value_removes_file_when_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = ConfigDir::at(tmp.path());
        let store = KeyValueFile::new(dir.clone(), "storage.json");

        store.set("access-token", "abc").unwrap();
        assert!(dir.exists("storage.json"));
        store.remove("access-token").unwrap();
        assert!(!dir.exists("storage.json"));
    }
}
