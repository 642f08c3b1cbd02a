//! NDJSON stdout sink for emitted block messages.

use async_trait::async_trait;
use evmcast_core::{PublishError, Publisher};
use evmcast_types::Message;
use serde::Serialize;
use tokio::io::{self, AsyncWriteExt};

/// Writes each published message as one JSON line on stdout, tagged with
/// its topic. Line order matches publish order, which is all the ordering
/// contract asks of a transport.
#[derive(Debug, Default)]
pub struct StdoutPublisher;

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError> {
        let mut line = serde_json::to_vec(&Envelope { topic, message })
            .map_err(|err| PublishError::Transport(Box::new(err)))?;
        line.push(b'\n');

        let mut stdout = io::stdout();
        stdout
            .write_all(&line)
            .await
            .map_err(|err| PublishError::Transport(Box::new(err)))?;
        stdout.flush().await.map_err(|err| PublishError::Transport(Box::new(err)))
    }
}
