use evmcast_core::ChainClient;
use evmcast_types::Block;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Polls the upstream tip and forwards newly observed head blocks into the
/// listener channel.
///
/// Transient upstream failures are logged and retried on the next tick. A
/// tip that moved by more than one block is forwarded as-is; bridging the
/// skipped heights is the listener's job.
#[derive(Debug)]
pub struct HeadWatcher<C> {
    client: Arc<C>,
    block_tx: mpsc::Sender<Block>,
    poll_interval: Duration,
    cancellation: CancellationToken,
}

impl<C: ChainClient> HeadWatcher<C> {
    /// Creates a new [`HeadWatcher`].
    pub const fn new(
        client: Arc<C>,
        block_tx: mpsc::Sender<Block>,
        poll_interval: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        Self { client, block_tx, poll_interval, cancellation }
    }

    /// Runs the poll loop until cancellation fires or the listener side of
    /// the channel goes away.
    pub async fn run(self) {
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Track the last tip we forwarded; repeated polls of an unchanged
        // head produce nothing.
        let mut last_number: Option<u64> = None;

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "evmcast::head_watcher", "Cancellation requested, stopping...");
                    return;
                }
                _ = ticker.tick() => {
                    let number = match self.client.block_number().await {
                        Ok(number) => number,
                        Err(err) => {
                            warn!(target: "evmcast::head_watcher", %err, "Failed to poll upstream height");
                            continue;
                        }
                    };
                    if last_number == Some(number) {
                        continue;
                    }

                    match self.client.block_by_number(number).await {
                        Ok(block) => {
                            info!(
                                target: "evmcast::head_watcher",
                                number = block.number,
                                hash = %block.hash,
                                "New head block observed"
                            );
                            if self.block_tx.send(block).await.is_err() {
                                info!(target: "evmcast::head_watcher", "Block channel closed, stopping...");
                                return;
                            }
                            last_number = Some(number);
                        }
                        Err(err) => {
                            warn!(target: "evmcast::head_watcher", %err, "Failed to fetch new head block");
                        }
                    }
                }
            }
        }
    }
}
