//! Core types shared across evmcast components.
//!
//! This crate defines the canonical in-memory block representation, the
//! emitted message schema, and the extended header codec used when decoding
//! upstream Avalanche C-chain style headers.

pub mod avax;

mod block;
pub use block::Block;

mod message;
pub use message::Message;

mod error;
pub use error::CodecError;

pub use alloy_rpc_types_eth::Log;
