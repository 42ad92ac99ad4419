use crate::chain_watcher::EthereumWatcher;
use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::retry::{RetryPolicy, RetryScheduler};
use crate::rpc_client::RpcClient;
use async_trait::async_trait;
use bridgewatch_storage::Storage;
use bridgewatch_types::{platforms, PendingSwap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Polling contract every foreign-chain integration implements.
#[async_trait]
pub trait PlatformWatcher: Send {
    fn platform_name(&self) -> &str;

    /// The watcher's own operating address on the foreign chain.
    fn local_address(&self) -> &str;

    /// One polling step. The returned swaps belong to this call only and are
    /// never replayed by a later call, except after a restart.
    async fn update(&mut self) -> Result<Vec<PendingSwap>, WatcherError>;

    /// Address a credential controls on this platform. Not callable through
    /// `dyn PlatformWatcher`; use [`Platform::derive_address`] to dispatch by
    /// platform name.
    fn derive_address(credential: &str) -> Result<String, WatcherError>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Ethereum,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Ethereum => platforms::ETHEREUM,
        }
    }

    pub fn derive_address(&self, credential: &str) -> Result<String, WatcherError> {
        match self {
            Platform::Ethereum => EthereumWatcher::derive_address(credential),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            platforms::ETHEREUM => Ok(Platform::Ethereum),
            other => Err(WatcherError::Config(format!("unsupported platform: {}", other))),
        }
    }
}

pub async fn build_watcher(
    platform: Platform,
    config: &WatcherConfig,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
) -> Result<Box<dyn PlatformWatcher>, WatcherError> {
    let retry = RetryScheduler::new(RetryPolicy::default(), cancel);

    match platform {
        Platform::Ethereum => {
            let eth = &config.ethereum;
            let api = RpcClient::new(&eth.rpc_url, eth.rpc_timeout_seconds)
                .map_err(|e| WatcherError::Config(format!("cannot build RPC client: {}", e)))?;
            let watcher = EthereumWatcher::new(eth, Arc::new(api), storage, retry).await?;
            Ok(Box::new(watcher))
        }
    }
}

/// Resolves every configured platform name. Unknown names are fatal.
pub fn configured_platforms(config: &WatcherConfig) -> Result<Vec<Platform>, WatcherError> {
    config.platforms.iter().map(|name| name.parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_str() {
        assert_eq!("ethereum".parse::<Platform>().unwrap(), Platform::Ethereum);
        assert_eq!(" Ethereum ".parse::<Platform>().unwrap(), Platform::Ethereum);
        assert!(matches!("neo".parse::<Platform>(), Err(WatcherError::Config(_))));
        assert_eq!(Platform::Ethereum.to_string(), "ethereum");
    }

    #[test]
    fn test_unknown_configured_platform_is_fatal() {
        let mut config = WatcherConfig::default();
        config.platforms = vec!["ethereum".to_string(), "bitcoin".to_string()];
        assert!(configured_platforms(&config).is_err());

        config.platforms = vec!["ethereum".to_string()];
        assert_eq!(configured_platforms(&config).unwrap(), vec![Platform::Ethereum]);
    }

    #[test]
    fn test_derive_address_through_registry() {
        let address = Platform::Ethereum
            .derive_address("4646464646464646464646464646464646464646464646464646464646464646")
            .unwrap();
        assert_eq!(address, "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f");

        assert!(Platform::Ethereum.derive_address("not a key").is_err());
    }
}
