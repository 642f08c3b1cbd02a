//! Upstream connectivity for evmcast: the JSON-RPC chain client and the
//! head watcher that feeds observed blocks into the listener.

mod rpc;
pub use rpc::RpcChainClient;

mod head;
pub use head::HeadWatcher;
