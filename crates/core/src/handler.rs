use crate::{ChainClient, ListenerError, Publisher, ReorgResolver};
use evmcast_storage::{BlockKeeper, KeyValueStore};
use evmcast_types::{Block, Message};
use futures::future::try_join_all;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Races a suspending call against the cancellation token.
async fn guarded<T>(
    cancellation: &CancellationToken,
    call: impl Future<Output = T> + Send,
) -> Result<T, ListenerError> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(ListenerError::Canceled),
        out = call => Ok(out),
    }
}

/// Per-block orchestration: dedup, reorg classification, resolution,
/// publication, and history commit.
///
/// The handler is single-writer against its keeper; one `handle` call is
/// active at a time and no lock is held across a suspending call.
#[derive(Debug)]
pub struct Handler<C, S, P> {
    topic: String,
    client: Arc<C>,
    keeper: BlockKeeper<S>,
    publisher: Arc<P>,
    resolver: ReorgResolver<C>,
    cancellation: CancellationToken,
}

impl<C, S, P> Handler<C, S, P>
where
    C: ChainClient + 'static,
    S: KeyValueStore,
    P: Publisher,
{
    /// Creates a handler publishing to `topic`.
    pub fn new(
        topic: impl Into<String>,
        client: Arc<C>,
        keeper: BlockKeeper<S>,
        publisher: Arc<P>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            resolver: ReorgResolver::new(client.clone()),
            client,
            keeper,
            publisher,
            cancellation,
        }
    }

    /// Read access to the underlying block history.
    pub const fn keeper(&self) -> &BlockKeeper<S> {
        &self.keeper
    }

    /// Primes the block history.
    ///
    /// Resumes from the persisted window when one survives; otherwise
    /// fetches the window-sized suffix ending at the current upstream tip
    /// and commits it in ascending order. Any seed fetch failure is fatal
    /// to startup.
    pub async fn init(&mut self) -> Result<(), ListenerError> {
        guarded(&self.cancellation, self.keeper.init()).await??;
        if !self.keeper.is_empty() {
            info!(
                target: "evmcast::handler",
                len = self.keeper.len(),
                "Resuming from persisted block window"
            );
            return Ok(());
        }

        let to = guarded(&self.cancellation, self.client.block_number()).await??;
        let from = to.saturating_sub((self.keeper.capacity() as u64).saturating_sub(1));
        info!(target: "evmcast::handler", from, to, "Seeding block window from upstream");

        let fetches = (from..=to).map(|number| {
            let client = self.client.clone();
            async move { client.block_by_number(number).await }
        });
        let mut blocks = guarded(&self.cancellation, try_join_all(fetches)).await??;
        blocks.sort_by_key(|block| block.number);

        for block in blocks {
            self.keeper.add(block).await?;
        }
        info!(target: "evmcast::handler", len = self.keeper.len(), "Seeded block window");
        Ok(())
    }

    /// Processes one observed block.
    ///
    /// Publishes exactly one message naming the blocks to revert and the
    /// blocks to apply, then commits the applied blocks to the history.
    /// Publication strictly precedes the commit, so a crash in between
    /// re-publishes the same message on the next delivery instead of
    /// losing it; subscribers deduplicate on the tip hash.
    pub async fn handle(&mut self, block: Block) -> Result<(), ListenerError> {
        if self.cancellation.is_cancelled() {
            return Err(ListenerError::Canceled);
        }

        debug!(
            target: "evmcast::handler",
            number = block.number,
            hash = %block.hash,
            parent_hash = %block.parent_hash,
            logs = block.logs.len(),
            "Handling observed block"
        );

        // A re-delivered canonical block is a duplicate. A retained block
        // that lost an earlier reorg is not: seeing it again means the
        // chain flipped back, and subscribers need the revert/apply pair.
        if self.keeper.exists(&block.hash) && self.keeper.is_canonical(&block)? {
            debug!(
                target: "evmcast::handler",
                hash = %block.hash,
                "Ignoring already handled block"
            );
            return Ok(());
        }

        let (reverted_blocks, new_blocks) = if self.keeper.is_reorg(&block)? {
            info!(
                target: "evmcast::handler",
                number = block.number,
                hash = %block.hash,
                "Resolving reorganization"
            );
            let stored_tip = self.keeper.head()?.clone();
            guarded(
                &self.cancellation,
                self.resolver.resolve(&self.keeper, stored_tip, block),
            )
            .await??
        } else {
            (Vec::new(), vec![block])
        };

        let message = Message { reverted_blocks, new_blocks };
        guarded(&self.cancellation, self.publisher.publish(&self.topic, &message)).await??;

        if !message.reverted_blocks.is_empty() {
            warn!(
                target: "evmcast::handler",
                reverted = message.reverted_blocks.len(),
                applied = message.new_blocks.len(),
                tip = ?message.tip(),
                "Published reorganization"
            );
        }

        // Committed only after a successful publish. Reverted blocks stay
        // in the keeper until capacity evicts them.
        for block in message.new_blocks {
            guarded(&self.cancellation, self.keeper.add(block)).await??;
        }
        Ok(())
    }
}
