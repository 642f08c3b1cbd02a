//! Core logic for the evmcast block stream.
//!
//! This crate contains the reorg resolution engine, the per-block event
//! handler that drives it, and the trait seams to the external
//! collaborators (upstream chain RPC, pub/sub transport, durable history
//! store).

mod client;
pub use client::{ChainClient, ClientError};

mod config;
pub use config::{Config, ConfigError};

mod error;
pub use error::ListenerError;

mod publisher;
pub use publisher::{ChannelPublisher, PublishError, Publisher};

mod resolver;
pub use resolver::ReorgResolver;

mod handler;
pub use handler::Handler;

mod listener;
pub use listener::ListenerActor;
