mod chain_watcher;
mod config;
mod error;
mod event_processor;
mod rpc_client;

pub mod crawler;
pub mod eth_api;
pub mod oracle;
pub mod platform;
pub mod retry;
pub mod signature;

pub use chain_watcher::EthereumWatcher;
pub use config::{parse_contracts, ContractConfig, EthereumConfig, WatcherConfig};
pub use error::{DecodeError, RpcError, WatcherError};
pub use event_processor::EventProcessor;
pub use oracle::{Oracle, OracleReader, OracleValue};
pub use platform::{build_watcher, configured_platforms, Platform, PlatformWatcher};
pub use retry::{RetryPolicy, RetryScheduler};
pub use rpc_client::RpcClient;

use bridgewatch_storage::Storage;
use bridgewatch_types::PendingSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drives every configured platform watcher on a fixed cadence.
pub struct Watcher {
    watchers: Vec<Box<dyn PlatformWatcher>>,
    cancel: CancellationToken,
}

impl Watcher {
    pub fn new(watchers: Vec<Box<dyn PlatformWatcher>>, cancel: CancellationToken) -> Self {
        Self { watchers, cancel }
    }

    pub async fn from_config(
        config: &WatcherConfig,
        storage: Arc<dyn Storage>,
        cancel: CancellationToken,
    ) -> Result<Self, WatcherError> {
        let mut watchers = Vec::new();
        for platform in configured_platforms(config)? {
            let watcher = build_watcher(platform, config, storage.clone(), cancel.clone()).await?;
            info!("Watching {} as {}", watcher.platform_name(), watcher.local_address());
            watchers.push(watcher);
        }
        Ok(Self::new(watchers, cancel))
    }

    pub fn watchers(&self) -> &[Box<dyn PlatformWatcher>] {
        &self.watchers
    }

    /// One `update` on every watcher, in configuration order.
    pub async fn poll(&mut self) -> Result<Vec<PendingSwap>, WatcherError> {
        let mut swaps = Vec::new();
        for watcher in &mut self.watchers {
            swaps.extend(watcher.update().await?);
        }
        Ok(swaps)
    }

    /// Polls until cancelled, handing each non-empty batch of swaps to `sink`.
    pub async fn run<F>(&mut self, poll_interval: Duration, mut sink: F) -> Result<(), WatcherError>
    where
        F: FnMut(Vec<PendingSwap>) + Send,
    {
        if poll_interval.is_zero() {
            return Err(WatcherError::Config("poll interval must be greater than zero".to_string()));
        }

        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll().await {
                Ok(swaps) if swaps.is_empty() => {}
                Ok(swaps) => sink(swaps),
                Err(WatcherError::Cancelled) => break,
                Err(e) => {
                    error!("Watcher stopped: {}", e);
                    return Err(e);
                }
            }
        }

        info!("Watcher shut down");
        Ok(())
    }
}
