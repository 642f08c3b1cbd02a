//! evmcast: ingests the head of an EVM-compatible chain and republishes a
//! canonical, reorg-aware stream of block events.

use anyhow::Result;
use clap::Parser;
use evmcast_client::{HeadWatcher, RpcChainClient};
use evmcast_core::{Config, Handler, ListenerActor};
use evmcast_storage::{BlockKeeper, MemoryStore};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

mod publisher;
use publisher::StdoutPublisher;

/// evmcast CLI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// URL of the upstream execution client JSON-RPC API.
    #[clap(long, visible_alias = "rpc", env = "EVMCAST_RPC_URL")]
    rpc_url: Url,
    /// Topic the block messages are published on.
    #[clap(long, default_value = "evmcast.blocks", env = "EVMCAST_TOPIC")]
    topic: String,
    /// Number of recent blocks retained; bounds the deepest recoverable
    /// reorganization.
    #[clap(long, default_value = "64", env = "EVMCAST_WINDOW")]
    window: usize,
    /// Seconds between upstream head polls.
    #[clap(long, default_value = "2", env = "EVMCAST_POLL_INTERVAL")]
    poll_interval: u64,
    /// Key prefix isolating this deployment in a shared history store.
    #[clap(long, default_value = "evmcast", env = "EVMCAST_KEY_PREFIX")]
    key_prefix: String,
    /// Seconds a persisted history entry lives before expiring.
    #[clap(long, default_value = "86400", env = "EVMCAST_BLOCK_TTL")]
    block_ttl: u64,
    /// Verbosity level (-v debug, -vv trace).
    #[clap(short = 'v', action = clap::ArgAction::Count)]
    v: u8,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            rpc_url: self.rpc_url.clone(),
            topic: self.topic.clone(),
            window: self.window,
            poll_interval: Duration::from_secs(self.poll_interval),
            key_prefix: self.key_prefix.clone(),
            block_ttl: Duration::from_secs(self.block_ttl),
        }
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.v);

    let config = cli.config();
    config.validate()?;
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    info!(
        target: "evmcast",
        rpc_url = %config.rpc_url,
        topic = %config.topic,
        window = config.window,
        key_prefix = %config.key_prefix,
        "Starting evmcast"
    );

    let cancellation = CancellationToken::new();
    let client = Arc::new(RpcChainClient::connect_http(config.rpc_url.clone()));
    let store = MemoryStore::with_prefix(config.key_prefix.clone());
    let keeper = BlockKeeper::new(store, config.window, config.block_ttl);
    let handler = Handler::new(
        config.topic.clone(),
        client.clone(),
        keeper,
        Arc::new(StdoutPublisher),
        cancellation.clone(),
    );

    let (block_tx, block_rx) = mpsc::channel(256);
    let watcher =
        HeadWatcher::new(client, block_tx, config.poll_interval, cancellation.clone());
    let listener = ListenerActor::new(handler, block_rx, cancellation.clone());

    let watcher_task = tokio::spawn(watcher.run());
    let mut listener_task = tokio::spawn(listener.start());

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(target: "evmcast", "Shutdown signal received, stopping...");
            cancellation.cancel();
            (&mut listener_task).await?
        }
        joined = &mut listener_task => {
            cancellation.cancel();
            joined?
        }
    };
    watcher_task.await?;

    result.map_err(Into::into)
}
