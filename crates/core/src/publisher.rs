use async_trait::async_trait;
use derive_more::Constructor;
use evmcast_storage::SourceError;
use evmcast_types::Message;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by a message publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The receiving side of the transport is gone.
    #[error("publish channel closed")]
    ChannelClosed,

    /// The transport failed to accept the message.
    #[error("publish transport failure")]
    Transport(#[source] SourceError),
}

/// Sink for emitted block messages.
///
/// The transport must preserve message order for a single publisher on a
/// single topic; the at-least-once contract of the stream rests on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Debug + Send + Sync {
    /// Publishes `message` on `topic`.
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError>;
}

/// Queue-based [`Publisher`] handing messages to an in-process consumer.
#[derive(Debug, Clone, Constructor)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<(String, Message)>,
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError> {
        self.sender
            .send((topic.to_owned(), message.clone()))
            .await
            .map_err(|_| PublishError::ChannelClosed)
    }
}
