use crate::{ChainClient, ClientError, ListenerError};
use alloy_primitives::B256;
use derive_more::Constructor;
use evmcast_storage::{BlockKeeper, KeyValueStore};
use evmcast_types::Block;
use std::sync::Arc;
use tracing::debug;

/// Resolves a reorganization by walking the stored and observed chains back
/// to their common ancestor.
///
/// The walk advances whichever cursor sits higher, so the two converge in
/// height before converging in ancestry; total work is bounded by the
/// combined length of the two suffixes. Stored-side ancestors must come
/// from the keeper (running out means the reorg is deeper than the
/// window); observed-side ancestors are taken from the keeper when
/// retained and fetched from the upstream otherwise.
#[derive(Debug, Constructor)]
pub struct ReorgResolver<C> {
    client: Arc<C>,
}

impl<C: ChainClient> ReorgResolver<C> {
    /// Walks back from `stored_tip` and `new_tip` until they share a
    /// parent, returning the blocks to revert (tip to ancestor) and the
    /// blocks to apply (ancestor to tip). The common ancestor itself
    /// appears in neither.
    ///
    /// Does not mutate the keeper.
    pub async fn resolve<S: KeyValueStore>(
        &self,
        keeper: &BlockKeeper<S>,
        stored_tip: Block,
        new_tip: Block,
    ) -> Result<(Vec<Block>, Vec<Block>), ListenerError> {
        debug!(
            target: "evmcast::resolver",
            stored_number = stored_tip.number,
            stored_hash = %stored_tip.hash,
            new_number = new_tip.number,
            new_hash = %new_tip.hash,
            "Walking back to common ancestor"
        );

        let mut stored = stored_tip;
        let mut observed = new_tip;
        let mut reverted = vec![stored.clone()];
        let mut applied = vec![observed.clone()];

        loop {
            // The observed chain can run straight through the stored
            // cursor (the upstream skipped heights without forking). The
            // cursor itself is then the common ancestor and must not be
            // reverted.
            if observed.parent_hash == stored.hash {
                reverted.pop();
                break;
            }
            if stored.parent_hash == observed.parent_hash {
                break;
            }

            if stored.number >= observed.number {
                stored = keeper
                    .get(&stored.parent_hash)
                    .map_err(|err| {
                        if err.is_not_found() {
                            ListenerError::ReorgTooDeep(stored.parent_hash)
                        } else {
                            err.into()
                        }
                    })?
                    .clone();
                reverted.push(stored.clone());
            }

            if observed.number > stored.number {
                observed = self.ancestor(keeper, observed.parent_hash).await?;
                applied.push(observed.clone());
            }
        }

        applied.reverse();
        Ok((reverted, applied))
    }

    /// Looks an ancestor up in the keeper, falling back to the upstream.
    async fn ancestor<S: KeyValueStore>(
        &self,
        keeper: &BlockKeeper<S>,
        hash: B256,
    ) -> Result<Block, ListenerError> {
        match keeper.get(&hash) {
            Ok(block) => Ok(block.clone()),
            Err(err) if err.is_not_found() => {
                self.client.block_by_hash(hash).await.map_err(|err| match err {
                    err @ ClientError::BlockNotFound(_) => {
                        ListenerError::AncestorUnavailable(hash, err)
                    }
                    err => ListenerError::Client(err),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
