//! Small persistent key-value store used for per-install state.
//!
//! Holds the anonymous install identifier, the first-launch timestamp and
//! the set of item ids this install has already upvoted. Hosts with their
//! own preferences storage implement `KeyValueStore` over it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, WishError};

pub const USER_IDENTIFIER_KEY: &str = "com.founderwish.userIdentifier";
pub const INSTALL_DATE_KEY: &str = "com.founderwish.installDate";
pub const VOTED_IDS_KEY: &str = "iw_voted_ids";

/// String-to-string persistent storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-lifetime store, the default when the host provides none.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-object file on disk. Every `set` rewrites the file through a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                WishError::Storage(format!("corrupt store {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(WishError::Storage(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened file store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WishError::Storage(format!("failed to create {}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)
            .map_err(|e| WishError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| WishError::Storage(format!("failed to replace {}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Stable anonymous identity of this installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallIdentity {
    pub user_identifier: String,
    pub install_date: DateTime<Utc>,
}

impl InstallIdentity {
    /// Reads the identity from `store`, creating and persisting whichever
    /// half is missing or unreadable.
    pub fn load_or_create(store: &dyn KeyValueStore) -> Result<Self> {
        let user_identifier = match store.get(USER_IDENTIFIER_KEY)? {
            Some(existing) if !existing.is_empty() => existing,
            _ => {
                let fresh = Uuid::new_v4().to_string().to_uppercase();
                store.set(USER_IDENTIFIER_KEY, &fresh)?;
                fresh
            }
        };

        let stored_date = store
            .get(INSTALL_DATE_KEY)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|d| d.with_timezone(&Utc));
        let install_date = match stored_date {
            Some(date) => date,
            None => {
                let now = Utc::now();
                store.set(INSTALL_DATE_KEY, &now.to_rfc3339())?;
                now
            }
        };

        Ok(Self {
            user_identifier,
            install_date,
        })
    }
}
