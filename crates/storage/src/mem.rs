use crate::{KeyValueStore, StorageError};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// An in-process [`KeyValueStore`] with deadline-based expiry.
///
/// Used by tests and by single-process deployments that can afford to
/// re-seed after a restart. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    prefix: String,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that namespaces every key under `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), entries: Arc::default() }
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}:{key}", self.prefix)
        }
    }

    /// Drops the value stored under `key`, if any.
    pub fn remove(&self, key: &str) {
        self.entries.lock().expect("memory store lock poisoned").remove(&self.key(key));
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let entry = Entry { value, expires_at: ttl.map(|ttl| Instant::now() + ttl) };
        self.entries.lock().expect("memory store lock poisoned").insert(self.key(key), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let prefixed = self.key(key);
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        match entries.get(&prefixed) {
            Some(entry) if entry.is_expired() => {
                entries.remove(&prefixed);
                Err(StorageError::EntryNotFound(key.to_owned()))
            }
            Some(entry) => Ok(entry.value.clone()),
            None => Err(StorageError::EntryNotFound(key.to_owned())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let prefixed = self.key(key);
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        match entries.get(&prefixed) {
            Some(entry) if entry.is_expired() => {
                entries.remove(&prefixed);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}
