use crate::{ClientError, PublishError};
use alloy_primitives::B256;
use evmcast_storage::StorageError;
use thiserror::Error;

/// Errors produced while handling an observed block.
///
/// Every variant is surfaced to the subscription loop without internal
/// retry; re-delivery of the same block reproduces the same resolution.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Block history storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The upstream chain client failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The upstream cannot supply an ancestor the resolution needs.
    #[error("ancestor {0} unavailable from upstream")]
    AncestorUnavailable(B256, #[source] ClientError),

    /// The walk back ran past the retained window without finding a common
    /// ancestor. Fatal for this block; the operator must widen the window
    /// or accept lost continuity.
    #[error("reorganization deeper than the retained window (walked past {0})")]
    ReorgTooDeep(B256),

    /// Publishing the resolved message failed; the history was left at the
    /// old head.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The operation was canceled cooperatively.
    #[error("operation canceled")]
    Canceled,
}

impl ListenerError {
    /// Returns `true` for errors that re-delivery cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Corrupt(_)))
    }
}
