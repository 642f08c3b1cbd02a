use alloy_primitives::B256;
use async_trait::async_trait;
use evmcast_storage::SourceError;
use evmcast_types::{Block, Log};
use std::fmt::Debug;
use thiserror::Error;

/// Errors surfaced by an upstream chain client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The upstream does not hold the requested block.
    #[error("block {0} not found on upstream")]
    BlockNotFound(String),

    /// The transport to the upstream failed.
    #[error("upstream transport failure")]
    Transport(#[source] SourceError),

    /// The upstream responded with a payload that failed to decode.
    #[error("decoding upstream payload failed")]
    Decode(#[source] SourceError),
}

/// Read access to the upstream chain node.
///
/// Calls may fail transiently; callers surface the error and leave retry to
/// their own supervision, so implementations must not retry internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Debug + Send + Sync {
    /// The current chain head height.
    async fn block_number(&self) -> Result<u64, ClientError>;

    /// Fetches a full block (with logs) by hash.
    async fn block_by_hash(&self, hash: B256) -> Result<Block, ClientError>;

    /// Fetches a full block (with logs) by height.
    async fn block_by_number(&self, number: u64) -> Result<Block, ClientError>;

    /// Fetches the logs emitted by the block with the given hash, in
    /// upstream order.
    async fn logs_by_block(&self, hash: B256) -> Result<Vec<Log>, ClientError>;
}
