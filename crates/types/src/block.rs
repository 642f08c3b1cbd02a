use alloy_primitives::{B256, U256};
use alloy_rpc_types_eth::Log;
use serde::{Deserialize, Serialize};

/// A single observed block, reduced to the attributes the stream needs to
/// track canonical lineage plus the logs attached to it.
///
/// Blocks are immutable once constructed. Identity is the `hash`; two blocks
/// with the same hash are the same block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// The hash of the block itself.
    pub hash: B256,
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The height of the block on the chain.
    ///
    /// Serialized as a decimal string so consumers reading the stream as
    /// JSON never truncate heights above 2^53.
    #[serde(with = "decimal")]
    pub number: u64,
    /// The block timestamp (seconds since Unix epoch).
    pub timestamp: u64,
    /// Hash of the Avalanche atomic-transaction extra data, when the
    /// upstream serves extended headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_data_hash: Option<B256>,
    /// EIP-1559 base fee, when present on the upstream header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<U256>,
    /// Gas consumed by the extra-data portion of the block, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_data_gas_used: Option<U256>,
    /// The block gas cost, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_gas_cost: Option<U256>,
    /// Excess data gas, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_data_gas: Option<U256>,
    /// The logs emitted by the block, in upstream order.
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Block {
    /// Returns `true` if `self` directly extends `parent`.
    pub fn is_child_of(&self, parent: &Self) -> bool {
        self.parent_hash == parent.hash
    }
}

mod decimal {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(number) => Ok(number),
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}
