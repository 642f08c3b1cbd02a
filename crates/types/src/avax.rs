//! Extended header codec for Avalanche C-chain style upstreams.
//!
//! The C-chain serves the standard Ethereum header fields plus an extension
//! tail (`extDataHash`, `baseFeePerGas`, `extDataGasUsed`, `blockGasCost`,
//! `excessDataGas`). The tail fields entered the format one at a time, so a
//! header RLP list may legally end after any of them; the encoder emits an
//! optional slot iff that field or any later one is present, and a forced
//! but absent slot encodes as the zero quantity.

use crate::{Block, CodecError};
use alloy_primitives::{Address, B64, B256, Bloom, Bytes, U64, U256, keccak256};
use alloy_rlp::{BufMut, Decodable, Encodable};
use alloy_rpc_types_eth::Log;
use serde::{Deserialize, Serialize, Serializer};

/// An upstream block header with the Avalanche C-chain extension tail.
///
/// JSON decoding validates the required fields and reports the first one
/// missing by its wire name. `mixHash` and `nonce` default to zero when
/// absent; the extension tail fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHeader")]
pub struct Header {
    /// Hash of the parent block.
    #[serde(rename = "parentHash")]
    pub parent_hash: B256,
    /// Hash of the uncle list.
    #[serde(rename = "sha3Uncles")]
    pub uncle_hash: B256,
    /// Beneficiary address.
    #[serde(rename = "miner")]
    pub coinbase: Address,
    /// State trie root.
    #[serde(rename = "stateRoot")]
    pub root: B256,
    /// Transaction trie root.
    #[serde(rename = "transactionsRoot")]
    pub tx_hash: B256,
    /// Receipt trie root.
    #[serde(rename = "receiptsRoot")]
    pub receipt_hash: B256,
    /// Bloom filter over the block's logs.
    #[serde(rename = "logsBloom")]
    pub bloom: Bloom,
    /// Block difficulty.
    pub difficulty: U256,
    /// Block height. Kept at full quantity width here; conversion to a
    /// chain height happens in [`Header::to_block`].
    pub number: U256,
    /// Gas limit.
    #[serde(rename = "gasLimit", serialize_with = "quantity")]
    pub gas_limit: u64,
    /// Gas used.
    #[serde(rename = "gasUsed", serialize_with = "quantity")]
    pub gas_used: u64,
    /// Block timestamp (seconds since Unix epoch).
    #[serde(rename = "timestamp", serialize_with = "quantity")]
    pub time: u64,
    /// Arbitrary extra data.
    #[serde(rename = "extraData")]
    pub extra: Bytes,
    /// Proof-of-work mix digest; zero on chains that do not use it.
    #[serde(rename = "mixHash")]
    pub mix_digest: B256,
    /// Proof-of-work nonce; zero on chains that do not use it.
    pub nonce: B64,
    /// Hash of the atomic-transaction extra data.
    #[serde(rename = "extDataHash")]
    pub ext_data_hash: B256,
    /// EIP-1559 base fee.
    #[serde(rename = "baseFeePerGas", skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<U256>,
    /// Gas consumed by the extra-data portion of the block.
    #[serde(rename = "extDataGasUsed", skip_serializing_if = "Option::is_none")]
    pub ext_data_gas_used: Option<U256>,
    /// The block gas cost.
    #[serde(rename = "blockGasCost", skip_serializing_if = "Option::is_none")]
    pub block_gas_cost: Option<U256>,
    /// Excess data gas.
    #[serde(rename = "excessDataGas", skip_serializing_if = "Option::is_none")]
    pub excess_data_gas: Option<U256>,
}

impl Header {
    /// Computes the block hash by hashing the RLP encoding of the header.
    pub fn hash_slow(&self) -> B256 {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        keccak256(&out)
    }

    /// Builds a [`Block`] from this header, the block hash reported by the
    /// upstream, and the block's logs.
    pub fn to_block(&self, hash: B256, logs: Vec<Log>) -> Result<Block, CodecError> {
        let number =
            u64::try_from(self.number).map_err(|_| CodecError::NumberOverflow(self.number))?;

        Ok(Block {
            hash,
            parent_hash: self.parent_hash,
            number,
            timestamp: self.time,
            ext_data_hash: Some(self.ext_data_hash),
            base_fee_per_gas: self.base_fee,
            ext_data_gas_used: self.ext_data_gas_used,
            block_gas_cost: self.block_gas_cost,
            excess_data_gas: self.excess_data_gas,
            logs,
        })
    }

    /// How many extension-tail slots the RLP form carries.
    fn rlp_tail_slots(&self) -> usize {
        if self.excess_data_gas.is_some() {
            4
        } else if self.block_gas_cost.is_some() {
            3
        } else if self.ext_data_gas_used.is_some() {
            2
        } else if self.base_fee.is_some() {
            1
        } else {
            0
        }
    }

    fn rlp_payload_length(&self) -> usize {
        let mut length = self.parent_hash.length()
            + self.uncle_hash.length()
            + self.coinbase.length()
            + self.root.length()
            + self.tx_hash.length()
            + self.receipt_hash.length()
            + self.bloom.length()
            + self.difficulty.length()
            + self.number.length()
            + self.gas_limit.length()
            + self.gas_used.length()
            + self.time.length()
            + self.extra.length()
            + self.mix_digest.length()
            + self.nonce.length()
            + self.ext_data_hash.length();

        let tail = [self.base_fee, self.ext_data_gas_used, self.block_gas_cost, self.excess_data_gas];
        for slot in tail.iter().take(self.rlp_tail_slots()) {
            length += slot.unwrap_or_default().length();
        }
        length
    }
}

impl Encodable for Header {
    fn encode(&self, out: &mut dyn BufMut) {
        alloy_rlp::Header { list: true, payload_length: self.rlp_payload_length() }.encode(out);

        self.parent_hash.encode(out);
        self.uncle_hash.encode(out);
        self.coinbase.encode(out);
        self.root.encode(out);
        self.tx_hash.encode(out);
        self.receipt_hash.encode(out);
        self.bloom.encode(out);
        self.difficulty.encode(out);
        self.number.encode(out);
        self.gas_limit.encode(out);
        self.gas_used.encode(out);
        self.time.encode(out);
        self.extra.encode(out);
        self.mix_digest.encode(out);
        self.nonce.encode(out);
        self.ext_data_hash.encode(out);

        let tail = [self.base_fee, self.ext_data_gas_used, self.block_gas_cost, self.excess_data_gas];
        for slot in tail.iter().take(self.rlp_tail_slots()) {
            slot.unwrap_or_default().encode(out);
        }
    }

    fn length(&self) -> usize {
        let payload_length = self.rlp_payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Header {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let rlp_head = alloy_rlp::Header::decode(buf)?;
        if !rlp_head.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        let started_len = buf.len();

        let mut this = Self {
            parent_hash: Decodable::decode(buf)?,
            uncle_hash: Decodable::decode(buf)?,
            coinbase: Decodable::decode(buf)?,
            root: Decodable::decode(buf)?,
            tx_hash: Decodable::decode(buf)?,
            receipt_hash: Decodable::decode(buf)?,
            bloom: Decodable::decode(buf)?,
            difficulty: Decodable::decode(buf)?,
            number: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            gas_used: Decodable::decode(buf)?,
            time: Decodable::decode(buf)?,
            extra: Decodable::decode(buf)?,
            mix_digest: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
            ext_data_hash: Decodable::decode(buf)?,
            base_fee: None,
            ext_data_gas_used: None,
            block_gas_cost: None,
            excess_data_gas: None,
        };

        if started_len - buf.len() < rlp_head.payload_length {
            this.base_fee = Some(Decodable::decode(buf)?);
        }
        if started_len - buf.len() < rlp_head.payload_length {
            this.ext_data_gas_used = Some(Decodable::decode(buf)?);
        }
        if started_len - buf.len() < rlp_head.payload_length {
            this.block_gas_cost = Some(Decodable::decode(buf)?);
        }
        if started_len - buf.len() < rlp_head.payload_length {
            this.excess_data_gas = Some(Decodable::decode(buf)?);
        }

        let consumed = started_len - buf.len();
        if consumed != rlp_head.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: rlp_head.payload_length,
                got: consumed,
            });
        }

        Ok(this)
    }
}

fn quantity<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    U64::from(*value).serialize(serializer)
}

/// Mirror of [`Header`] with every field optional, used to report which
/// required field an upstream payload is missing.
#[derive(Deserialize)]
struct RawHeader {
    #[serde(rename = "parentHash")]
    parent_hash: Option<B256>,
    #[serde(rename = "sha3Uncles")]
    uncle_hash: Option<B256>,
    #[serde(rename = "miner")]
    coinbase: Option<Address>,
    #[serde(rename = "stateRoot")]
    root: Option<B256>,
    #[serde(rename = "transactionsRoot")]
    tx_hash: Option<B256>,
    #[serde(rename = "receiptsRoot")]
    receipt_hash: Option<B256>,
    #[serde(rename = "logsBloom")]
    bloom: Option<Bloom>,
    difficulty: Option<U256>,
    number: Option<U256>,
    #[serde(rename = "gasLimit")]
    gas_limit: Option<U64>,
    #[serde(rename = "gasUsed")]
    gas_used: Option<U64>,
    #[serde(rename = "timestamp")]
    time: Option<U64>,
    #[serde(rename = "extraData")]
    extra: Option<Bytes>,
    #[serde(rename = "mixHash")]
    mix_digest: Option<B256>,
    nonce: Option<B64>,
    #[serde(rename = "extDataHash")]
    ext_data_hash: Option<B256>,
    #[serde(rename = "baseFeePerGas")]
    base_fee: Option<U256>,
    #[serde(rename = "extDataGasUsed")]
    ext_data_gas_used: Option<U256>,
    #[serde(rename = "blockGasCost")]
    block_gas_cost: Option<U256>,
    #[serde(rename = "excessDataGas")]
    excess_data_gas: Option<U256>,
}

impl TryFrom<RawHeader> for Header {
    type Error = CodecError;

    fn try_from(raw: RawHeader) -> Result<Self, CodecError> {
        Ok(Self {
            parent_hash: raw.parent_hash.ok_or(CodecError::MissingField("parentHash"))?,
            uncle_hash: raw.uncle_hash.ok_or(CodecError::MissingField("sha3Uncles"))?,
            coinbase: raw.coinbase.ok_or(CodecError::MissingField("miner"))?,
            root: raw.root.ok_or(CodecError::MissingField("stateRoot"))?,
            tx_hash: raw.tx_hash.ok_or(CodecError::MissingField("transactionsRoot"))?,
            receipt_hash: raw.receipt_hash.ok_or(CodecError::MissingField("receiptsRoot"))?,
            bloom: raw.bloom.ok_or(CodecError::MissingField("logsBloom"))?,
            difficulty: raw.difficulty.ok_or(CodecError::MissingField("difficulty"))?,
            number: raw.number.ok_or(CodecError::MissingField("number"))?,
            gas_limit: raw.gas_limit.ok_or(CodecError::MissingField("gasLimit"))?.to::<u64>(),
            gas_used: raw.gas_used.ok_or(CodecError::MissingField("gasUsed"))?.to::<u64>(),
            time: raw.time.ok_or(CodecError::MissingField("timestamp"))?.to::<u64>(),
            extra: raw.extra.ok_or(CodecError::MissingField("extraData"))?,
            mix_digest: raw.mix_digest.unwrap_or_default(),
            nonce: raw.nonce.unwrap_or_default(),
            ext_data_hash: raw.ext_data_hash.ok_or(CodecError::MissingField("extDataHash"))?,
            base_fee: raw.base_fee,
            ext_data_gas_used: raw.ext_data_gas_used,
            block_gas_cost: raw.block_gas_cost,
            excess_data_gas: raw.excess_data_gas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header_json() -> serde_json::Value {
        json!({
            "parentHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "miner": "0x0100000000000000000000000000000000000000",
            "stateRoot": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "transactionsRoot": "0x3333333333333333333333333333333333333333333333333333333333333333",
            "receiptsRoot": "0x4444444444444444444444444444444444444444444444444444444444444444",
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "difficulty": "0x1",
            "number": "0xa4",
            "gasLimit": "0x7a1200",
            "gasUsed": "0x5208",
            "timestamp": "0x64c7f3a2",
            "extraData": "0x",
            "extDataHash": "0x5555555555555555555555555555555555555555555555555555555555555555",
            "baseFeePerGas": "0x5d21dba00",
            "extDataGasUsed": "0x0",
            "blockGasCost": "0x0"
        })
    }

    #[test]
    fn test_decode_extended_header() {
        let header: Header = serde_json::from_value(header_json()).unwrap();
        assert_eq!(header.number, U256::from(0xa4));
        assert_eq!(header.gas_limit, 0x7a_1200);
        assert_eq!(header.time, 0x64c7_f3a2);
        assert_eq!(header.base_fee, Some(U256::from(0x5_d21d_ba00_u64)));
        assert_eq!(header.block_gas_cost, Some(U256::ZERO));
        assert_eq!(header.excess_data_gas, None);
        assert_eq!(header.mix_digest, B256::ZERO);
    }

    #[test]
    fn test_decode_names_missing_field() {
        for field in ["parentHash", "logsBloom", "timestamp", "extDataHash"] {
            let mut value = header_json();
            value.as_object_mut().unwrap().remove(field);
            let err = serde_json::from_value::<Header>(value).unwrap_err();
            assert_eq!(err.to_string(), format!("missing required field '{field}' for Header"));
        }
    }

    #[test]
    fn test_json_round_trip() {
        let header: Header = serde_json::from_value(header_json()).unwrap();
        let encoded = serde_json::to_value(&header).unwrap();
        assert!(encoded.as_object().unwrap().get("excessDataGas").is_none());

        let decoded: Header = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_rlp_round_trip_legacy() {
        let header = Header {
            parent_hash: B256::from([1u8; 32]),
            difficulty: U256::from(131_072u64),
            number: U256::from(164u64),
            gas_limit: 8_000_000,
            gas_used: 21_000,
            time: 1_700_000_000,
            extra: Bytes::from_static(b"ava"),
            ext_data_hash: B256::from([7u8; 32]),
            ..Default::default()
        };

        let mut out = Vec::new();
        header.encode(&mut out);
        assert_eq!(out.len(), header.length());

        let decoded = Header::decode(&mut out.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_rlp_round_trip_full_tail() {
        let header = Header {
            number: U256::from(900u64),
            base_fee: Some(U256::from(25_000_000_000u64)),
            ext_data_gas_used: Some(U256::from(42u64)),
            block_gas_cost: Some(U256::from(1_000_000u64)),
            excess_data_gas: Some(U256::from(7u64)),
            ..Default::default()
        };

        let mut out = Vec::new();
        header.encode(&mut out);
        let decoded = Header::decode(&mut out.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_rlp_forces_earlier_absent_slots_to_zero() {
        let header = Header {
            block_gas_cost: Some(U256::from(5u64)),
            ..Default::default()
        };

        let mut out = Vec::new();
        header.encode(&mut out);
        let decoded = Header::decode(&mut out.as_slice()).unwrap();

        // The absent earlier slots come back as explicit zero quantities.
        assert_eq!(decoded.base_fee, Some(U256::ZERO));
        assert_eq!(decoded.ext_data_gas_used, Some(U256::ZERO));
        assert_eq!(decoded.block_gas_cost, Some(U256::from(5u64)));
        assert_eq!(decoded.excess_data_gas, None);
    }

    #[test]
    fn test_hash_slow_tracks_contents() {
        let header: Header = serde_json::from_value(header_json()).unwrap();
        let altered = Header { number: U256::from(0xa5), ..header.clone() };
        assert_ne!(header.hash_slow(), altered.hash_slow());
        assert_eq!(header.hash_slow(), header.clone().hash_slow());
    }

    #[test]
    fn test_to_block_carries_extension_fields() {
        let header: Header = serde_json::from_value(header_json()).unwrap();
        let hash = header.hash_slow();
        let block = header.to_block(hash, Vec::new()).unwrap();

        assert_eq!(block.hash, hash);
        assert_eq!(block.number, 0xa4);
        assert_eq!(block.timestamp, header.time);
        assert_eq!(block.ext_data_hash, Some(header.ext_data_hash));
        assert_eq!(block.base_fee_per_gas, header.base_fee);
    }

    #[test]
    fn test_to_block_rejects_oversized_number() {
        let header = Header { number: U256::MAX, ..Default::default() };
        let err = header.to_block(B256::ZERO, Vec::new()).unwrap_err();
        assert_eq!(err, CodecError::NumberOverflow(U256::MAX));
    }
}
