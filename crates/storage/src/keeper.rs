use crate::{KeyValueStore, StorageError};
use alloy_primitives::B256;
use evmcast_types::Block;
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};
use tracing::{debug, warn};

const INDEX_KEY: &str = "blocks";
const HEAD_KEY: &str = "head";

fn block_key(hash: &B256) -> String {
    format!("block:{hash}")
}

/// Bounded, dual-indexed cache of recently observed canonical blocks.
///
/// The keeper answers hash lookups and head queries from memory and writes
/// every mutation through to the backing [`KeyValueStore`], so a restart
/// resumes from the persisted window. It is single-writer: the event
/// handler is the only caller, reads never interleave with a concurrent
/// `add`.
///
/// Reverted blocks are deliberately retained until capacity evicts them; a
/// chain that flips back to a previously seen branch must find those blocks
/// without refetching.
#[derive(Debug)]
pub struct BlockKeeper<S> {
    store: S,
    capacity: usize,
    ttl: Duration,
    blocks: HashMap<B256, Block>,
    /// Height-ordered view of the window. A height can hold several blocks
    /// once a reorg has been resolved across it; within one height the
    /// insertion order is preserved.
    heights: BTreeMap<u64, Vec<B256>>,
    head: Option<B256>,
}

impl<S: KeyValueStore> BlockKeeper<S> {
    /// Creates a keeper with the given backing store, window capacity, and
    /// TTL applied to persisted entries.
    ///
    /// The capacity bounds the deepest recoverable reorg; the TTL must be
    /// strictly greater than the longest outage the deployment intends to
    /// resume across.
    pub fn new(store: S, capacity: usize, ttl: Duration) -> Self {
        Self {
            store,
            capacity,
            ttl,
            blocks: HashMap::new(),
            heights: BTreeMap::new(),
            head: None,
        }
    }

    /// Loads the persisted window into memory.
    ///
    /// An empty store is not an error. A persisted index whose block
    /// payloads have partially expired is discarded wholesale: resuming
    /// with ancestry holes would break the walk-back guarantees.
    pub async fn init(&mut self) -> Result<(), StorageError> {
        let raw = match self.store.get(INDEX_KEY).await {
            Ok(raw) => raw,
            Err(StorageError::EntryNotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };
        let hashes: Vec<B256> = serde_json::from_slice(&raw)
            .map_err(|err| StorageError::Corrupt(format!("window index: {err}")))?;

        for hash in &hashes {
            let raw = match self.store.get(&block_key(hash)).await {
                Ok(raw) => raw,
                Err(StorageError::EntryNotFound(_)) => {
                    warn!(
                        target: "evmcast::keeper",
                        %hash,
                        "Persisted window has expired entries, starting empty"
                    );
                    self.blocks.clear();
                    self.heights.clear();
                    self.head = None;
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            let block: Block = serde_json::from_slice(&raw)
                .map_err(|err| StorageError::Corrupt(format!("block {hash}: {err}")))?;
            self.heights.entry(block.number).or_default().push(block.hash);
            self.blocks.insert(block.hash, block);
        }

        self.head = match self.store.get(HEAD_KEY).await {
            Ok(raw) => {
                let head: B256 = serde_json::from_slice(&raw)
                    .map_err(|err| StorageError::Corrupt(format!("head pointer: {err}")))?;
                self.blocks.contains_key(&head).then_some(head).or_else(|| self.highest())
            }
            Err(StorageError::EntryNotFound(_)) => self.highest(),
            Err(err) => return Err(err),
        };

        debug!(
            target: "evmcast::keeper",
            len = self.blocks.len(),
            "Loaded persisted block window"
        );
        Ok(())
    }

    /// Number of blocks currently held.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the window holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The window capacity fixed at construction.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `block` and marks it as the current head.
    ///
    /// Adding an already-known hash leaves the contents untouched but still
    /// moves the head: when a reorg flips back to a retained branch, the
    /// re-added block must win head selection. If the insertion overflows
    /// the capacity the lowest-numbered entry is evicted.
    pub async fn add(&mut self, block: Block) -> Result<(), StorageError> {
        let hash = block.hash;
        if !self.blocks.contains_key(&hash) {
            self.heights.entry(block.number).or_default().push(hash);
            self.blocks.insert(hash, block);
        }
        self.head = Some(hash);

        if self.blocks.len() > self.capacity {
            if let Some(evicted) = self.evict_lowest() {
                debug!(target: "evmcast::keeper", hash = %evicted, "Evicted block from window");
                if self.head == Some(evicted) {
                    self.head = self.highest();
                }
            }
        }

        self.persist(&hash).await
    }

    /// Looks up a block by hash.
    pub fn get(&self, hash: &B256) -> Result<&Block, StorageError> {
        self.blocks.get(hash).ok_or_else(|| StorageError::EntryNotFound(hash.to_string()))
    }

    /// Returns `true` if a block with `hash` is held.
    pub fn exists(&self, hash: &B256) -> bool {
        self.blocks.contains_key(hash)
    }

    /// The current head of the window.
    pub fn head(&self) -> Result<&Block, StorageError> {
        let hash = self.head.as_ref().ok_or(StorageError::EmptyHistory)?;
        self.blocks
            .get(hash)
            .ok_or_else(|| StorageError::Corrupt(format!("head {hash} missing from window")))
    }

    /// Classifies an observed block against the current head.
    ///
    /// `false` only for the clean extension: the block sits exactly one
    /// above the head and names it as parent. Everything else (lower or
    /// equal height, a gap, a sibling with a different parent) is a
    /// reorganization. Does not mutate the window.
    pub fn is_reorg(&self, block: &Block) -> Result<bool, StorageError> {
        let head = self.head()?;
        Ok(!(block.number == head.number + 1 && block.parent_hash == head.hash))
    }

    /// Returns `true` if `block` lies on the chain the current head
    /// descends from.
    ///
    /// A retained block that lost a reorg exists in the window but is not
    /// canonical; re-observing it upstream means the chain flipped back,
    /// not that the delivery is a duplicate.
    pub fn is_canonical(&self, block: &Block) -> Result<bool, StorageError> {
        let mut cursor = self.head()?;
        while cursor.number > block.number {
            match self.blocks.get(&cursor.parent_hash) {
                Some(parent) => cursor = parent,
                None => return Ok(false),
            }
        }
        Ok(cursor.hash == block.hash)
    }

    fn highest(&self) -> Option<B256> {
        self.heights.iter().next_back().and_then(|(_, hashes)| hashes.last().copied())
    }

    fn evict_lowest(&mut self) -> Option<B256> {
        let height = *self.heights.keys().next()?;
        let hashes = self.heights.get_mut(&height)?;
        let hash = hashes.remove(0);
        if hashes.is_empty() {
            self.heights.remove(&height);
        }
        self.blocks.remove(&hash);
        Some(hash)
    }

    async fn persist(&self, added: &B256) -> Result<(), StorageError> {
        if let Some(block) = self.blocks.get(added) {
            let raw = serde_json::to_vec(block)
                .map_err(|err| StorageError::Corrupt(format!("block {added}: {err}")))?;
            self.store.set(&block_key(added), raw, Some(self.ttl)).await?;
        }

        let index: Vec<B256> = self.heights.values().flatten().copied().collect();
        let raw = serde_json::to_vec(&index)
            .map_err(|err| StorageError::Corrupt(format!("window index: {err}")))?;
        self.store.set(INDEX_KEY, raw, Some(self.ttl)).await?;

        if let Some(head) = &self.head {
            let raw = serde_json::to_vec(head)
                .map_err(|err| StorageError::Corrupt(format!("head pointer: {err}")))?;
            self.store.set(HEAD_KEY, raw, Some(self.ttl)).await?;
        }
        Ok(())
    }
}
