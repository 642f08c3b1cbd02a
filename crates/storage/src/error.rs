use thiserror::Error;

/// A dynamic error type for encapsulating low-level backend errors.
///
/// Used as the source for [`StorageError::Backend`] so different key-value
/// backends can be wrapped uniformly.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that may occur while interacting with block history storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed to serve a read or write.
    #[error("store backend failure")]
    Backend(#[source] SourceError),

    /// The requested entry is not held by the store.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// The block history holds no entries.
    #[error("block history is empty")]
    EmptyHistory,

    /// A persisted entry failed to decode or an internal invariant broke.
    ///
    /// This is not recoverable by re-delivery; callers treat it as fatal.
    #[error("corrupt history entry: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Returns `true` if the error is a plain cache miss.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}
