use crate::{ChainClient, Handler, ListenerError, Publisher};
use evmcast_storage::KeyValueStore;
use evmcast_types::Block;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives the event handler from a stream of observed head blocks.
///
/// The actor seeds the handler once, then processes deliveries one at a
/// time. Per the error contract, only corruption aborts the actor; every
/// other failure is logged and the next delivery retries the work, since
/// re-delivery of the same block reproduces the same resolution.
#[derive(Debug)]
pub struct ListenerActor<C, S, P> {
    handler: Handler<C, S, P>,
    block_rx: mpsc::Receiver<Block>,
    cancellation: CancellationToken,
}

impl<C, S, P> ListenerActor<C, S, P>
where
    C: ChainClient + 'static,
    S: KeyValueStore,
    P: Publisher,
{
    /// Creates a new [`ListenerActor`].
    pub const fn new(
        handler: Handler<C, S, P>,
        block_rx: mpsc::Receiver<Block>,
        cancellation: CancellationToken,
    ) -> Self {
        Self { handler, block_rx, cancellation }
    }

    /// Seeds the history and runs the subscription loop until the stream
    /// ends, cancellation fires, or the history corrupts.
    pub async fn start(mut self) -> Result<(), ListenerError> {
        self.handler.init().await?;
        info!(target: "evmcast::listener", "Starting block listener");

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "evmcast::listener", "Cancellation requested, stopping...");
                    return Ok(());
                }
                maybe_block = self.block_rx.recv() => {
                    let Some(block) = maybe_block else {
                        info!(target: "evmcast::listener", "Block stream closed, stopping...");
                        return Ok(());
                    };

                    match self.handler.handle(block).await {
                        Ok(()) => {}
                        Err(ListenerError::Canceled) => {
                            info!(target: "evmcast::listener", "Handling canceled, stopping...");
                            return Ok(());
                        }
                        Err(err) if err.is_fatal() => {
                            error!(target: "evmcast::listener", %err, "Block history corrupt");
                            return Err(err);
                        }
                        Err(err) => {
                            warn!(
                                target: "evmcast::listener",
                                %err,
                                "Failed to handle block, awaiting re-delivery"
                            );
                        }
                    }
                }
            }
        }
    }
}
