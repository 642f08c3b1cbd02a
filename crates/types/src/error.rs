use alloy_primitives::U256;
use thiserror::Error;

/// Errors produced while decoding upstream header payloads into core types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A field the upstream must always carry was absent from the payload.
    #[error("missing required field '{0}' for Header")]
    MissingField(&'static str),

    /// The header's block number does not fit a chain height.
    #[error("block number {0} overflows u64")]
    NumberOverflow(U256),
}
