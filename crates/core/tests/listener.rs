//! Tests for the listener actor's error policy: recoverable failures keep
//! the loop alive for re-delivery, corruption aborts the actor, and
//! cancellation or a closed stream stops it cleanly.

use alloy_primitives::B256;
use async_trait::async_trait;
use evmcast_core::{
    ChainClient, ChannelPublisher, ClientError, Handler, ListenerActor, ListenerError,
};
use evmcast_storage::{BlockKeeper, KeyValueStore, MemoryStore, StorageError};
use evmcast_types::{Block, Log, Message};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(3600);

fn hash_at(number: u64, branch: u8) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = branch;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::new(bytes)
}

fn block_at(number: u64, branch: u8, parent_branch: u8) -> Block {
    Block {
        hash: hash_at(number, branch),
        parent_hash: hash_at(number - 1, parent_branch),
        number,
        timestamp: number,
        ..Default::default()
    }
}

/// Upstream serving one static canonical chain and nothing off it.
#[derive(Debug)]
struct StaticUpstream {
    tip: u64,
}

#[async_trait]
impl ChainClient for StaticUpstream {
    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.tip)
    }

    async fn block_by_hash(&self, hash: B256) -> Result<Block, ClientError> {
        Err(ClientError::BlockNotFound(hash.to_string()))
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, ClientError> {
        if number <= self.tip {
            Ok(block_at(number, 0, 0))
        } else {
            Err(ClientError::BlockNotFound(number.to_string()))
        }
    }

    async fn logs_by_block(&self, _hash: B256) -> Result<Vec<Log>, ClientError> {
        Ok(Vec::new())
    }
}

/// Store that behaves until poisoned, then fails every write as corrupt.
#[derive(Debug, Clone)]
struct PoisonableStore {
    inner: MemoryStore,
    poisoned: Arc<AtomicBool>,
}

impl PoisonableStore {
    fn new() -> Self {
        Self { inner: MemoryStore::new(), poisoned: Arc::new(AtomicBool::new(false)) }
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for PoisonableStore {
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(StorageError::Corrupt("write landed on a poisoned store".to_owned()));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(key).await
    }
}

struct Fixture {
    task: JoinHandle<Result<(), ListenerError>>,
    block_tx: mpsc::Sender<Block>,
    messages: mpsc::Receiver<(String, Message)>,
    cancellation: CancellationToken,
}

/// Spawns an actor over a tip-12 upstream; the seed fills the window with
/// blocks 9..=12.
fn spawn_actor<S: KeyValueStore + 'static>(store: S) -> Fixture {
    let upstream = Arc::new(StaticUpstream { tip: 12 });
    let keeper = BlockKeeper::new(store, 4, TTL);
    let (msg_tx, messages) = mpsc::channel(16);
    let cancellation = CancellationToken::new();
    let handler = Handler::new(
        "blocks",
        upstream,
        keeper,
        Arc::new(ChannelPublisher::new(msg_tx)),
        cancellation.clone(),
    );

    let (block_tx, block_rx) = mpsc::channel(16);
    let actor = ListenerActor::new(handler, block_rx, cancellation.clone());
    let task = tokio::spawn(actor.start());

    Fixture { task, block_tx, messages, cancellation }
}

#[tokio::test]
async fn test_recoverable_failure_keeps_the_loop_alive() {
    let mut fixture = spawn_actor(MemoryStore::new());

    // A tip whose ancestry the upstream cannot supply: resolution fails
    // with a recoverable error and nothing is published.
    fixture.block_tx.send(block_at(14, 1, 1)).await.unwrap();

    // The next delivery is handled normally, so the loop survived.
    fixture.block_tx.send(block_at(13, 0, 0)).await.unwrap();
    let (_, message) = fixture.messages.recv().await.unwrap();
    assert!(message.reverted_blocks.is_empty());
    assert_eq!(message.tip(), Some(hash_at(13, 0)));
    assert!(matches!(fixture.messages.try_recv(), Err(TryRecvError::Empty)));

    fixture.cancellation.cancel();
    fixture.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fatal_error_aborts_the_actor() {
    let store = PoisonableStore::new();
    let mut fixture = spawn_actor(store.clone());

    // Prove the actor is up and seeded.
    fixture.block_tx.send(block_at(13, 0, 0)).await.unwrap();
    let (_, message) = fixture.messages.recv().await.unwrap();
    assert_eq!(message.tip(), Some(hash_at(13, 0)));

    // The next commit hits corruption; the actor must not retry past it.
    store.poison();
    fixture.block_tx.send(block_at(14, 0, 0)).await.unwrap();

    let err = fixture.task.await.unwrap().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, ListenerError::Storage(StorageError::Corrupt(_))));
}

#[tokio::test]
async fn test_closed_stream_stops_cleanly() {
    let fixture = spawn_actor(MemoryStore::new());

    drop(fixture.block_tx);
    fixture.task.await.unwrap().unwrap();
}
