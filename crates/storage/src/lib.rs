//! Bounded, reorg-aware block history storage.
//!
//! The [`BlockKeeper`] holds the last `W` observed canonical blocks in
//! memory and writes every entry through to a [`KeyValueStore`] so a
//! restarted process resumes from the persisted tip instead of re-seeding.

mod error;
pub use error::{SourceError, StorageError};

mod traits;
pub use traits::KeyValueStore;

mod mem;
pub use mem::MemoryStore;

mod keeper;
pub use keeper::BlockKeeper;
