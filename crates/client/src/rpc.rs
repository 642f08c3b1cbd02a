use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{B256, U64};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_rpc_types_eth::Filter;
use async_trait::async_trait;
use evmcast_core::{ChainClient, ClientError};
use evmcast_types::{Block, Log, avax};
use serde::Deserialize;
use url::Url;

/// The upstream block envelope: the node-reported hash plus the header
/// fields, which sit inline on the same JSON object.
#[derive(Debug, Deserialize)]
struct RpcBlock {
    hash: B256,
    #[serde(flatten)]
    header: avax::Header,
}

/// [`ChainClient`] over a JSON-RPC execution client endpoint.
///
/// Block fetches decode the header through the extended codec, so an
/// upstream payload missing a required field surfaces as a decode error
/// naming that field. Calls are not retried here; supervision belongs to
/// the caller.
#[derive(Debug)]
pub struct RpcChainClient {
    rpc: RpcClient,
}

impl RpcChainClient {
    /// Wraps an existing RPC client.
    pub const fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Connects over HTTP to the given endpoint.
    pub fn connect_http(url: Url) -> Self {
        Self { rpc: ClientBuilder::default().http(url) }
    }

    /// Decodes an upstream block payload and attaches its logs.
    async fn assemble(&self, value: serde_json::Value) -> Result<Block, ClientError> {
        let raw: RpcBlock =
            serde_json::from_value(value).map_err(|err| ClientError::Decode(Box::new(err)))?;
        let logs = self.logs_by_block(raw.hash).await?;
        raw.header.to_block(raw.hash, logs).map_err(|err| ClientError::Decode(Box::new(err)))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ClientError> {
        let number: U64 = self
            .rpc
            .request_noparams("eth_blockNumber")
            .await
            .map_err(|err| ClientError::Transport(Box::new(err)))?;
        Ok(number.to::<u64>())
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Block, ClientError> {
        let value: Option<serde_json::Value> = self
            .rpc
            .request("eth_getBlockByHash", (hash, false))
            .await
            .map_err(|err| ClientError::Transport(Box::new(err)))?;
        let value = value.ok_or_else(|| ClientError::BlockNotFound(hash.to_string()))?;
        self.assemble(value).await
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, ClientError> {
        let value: Option<serde_json::Value> = self
            .rpc
            .request("eth_getBlockByNumber", (BlockNumberOrTag::Number(number), false))
            .await
            .map_err(|err| ClientError::Transport(Box::new(err)))?;
        let value = value.ok_or_else(|| ClientError::BlockNotFound(number.to_string()))?;
        self.assemble(value).await
    }

    async fn logs_by_block(&self, hash: B256) -> Result<Vec<Log>, ClientError> {
        let filter = Filter::new().at_block_hash(hash);
        self.rpc
            .request("eth_getLogs", (filter,))
            .await
            .map_err(|err| ClientError::Transport(Box::new(err)))
    }
}
