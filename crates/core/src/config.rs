use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors found while validating a [`Config`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The window cannot hold a head and an ancestor.
    #[error("window must hold at least 2 blocks, got {0}")]
    WindowTooSmall(usize),

    /// The publish topic is empty.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// Persisted entries would expire between observations.
    #[error("block TTL {ttl:?} must exceed the poll interval {poll_interval:?}")]
    TtlTooShort {
        /// The configured entry TTL.
        ttl: Duration,
        /// The configured head poll interval.
        poll_interval: Duration,
    },
}

/// Runtime configuration for one listener instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream execution client JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Topic the block messages are published on.
    pub topic: String,
    /// Number of recent blocks retained; bounds the deepest recoverable
    /// reorganization.
    pub window: usize,
    /// Interval between upstream head polls.
    pub poll_interval: Duration,
    /// Per-deployment prefix applied to persisted history keys.
    pub key_prefix: String,
    /// TTL applied to persisted history entries. Must outlive the longest
    /// outage the deployment intends to resume across.
    pub block_ttl: Duration,
}

impl Config {
    /// Checks the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window < 2 {
            return Err(ConfigError::WindowTooSmall(self.window));
        }
        if self.topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.block_ttl <= self.poll_interval {
            return Err(ConfigError::TtlTooShort {
                ttl: self.block_ttl,
                poll_interval: self.poll_interval,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            rpc_url: "http://localhost:9650/ext/bc/C/rpc".parse().unwrap(),
            topic: "blocks".to_owned(),
            window: 64,
            poll_interval: Duration::from_secs(2),
            key_prefix: "evmcast".to_owned(),
            block_ttl: Duration::from_secs(86_400),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert_eq!(config().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let narrow = Config { window: 1, ..config() };
        assert_eq!(narrow.validate(), Err(ConfigError::WindowTooSmall(1)));

        let unnamed = Config { topic: String::new(), ..config() };
        assert_eq!(unnamed.validate(), Err(ConfigError::EmptyTopic));

        let volatile = Config { block_ttl: Duration::from_secs(1), ..config() };
        assert!(matches!(volatile.validate(), Err(ConfigError::TtlTooShort { .. })));
    }
}
