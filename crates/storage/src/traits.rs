use crate::StorageError;
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

/// A durable key-value store with per-entry expiry.
///
/// Implementations are expected to apply a per-deployment key prefix so
/// multiple listeners can share one backend without colliding, and to treat
/// `ttl: None` as no expiry.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync {
    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    /// Reads the value stored under `key`.
    ///
    /// Returns [`StorageError::EntryNotFound`] for absent or expired keys.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Returns `true` if `key` holds a live value.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
