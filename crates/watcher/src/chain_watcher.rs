use crate::config::EthereumConfig;
use crate::crawler::BlockCrawler;
use crate::error::WatcherError;
use crate::eth_api::EthApi;
use crate::event_processor::EventProcessor;
use crate::oracle::{Oracle, OracleReader};
use crate::platform::PlatformWatcher;
use crate::retry::{BatchHeights, RetryScheduler, MAX_BATCH_SIZE};
use crate::signature::derive_eth_address;
use async_trait::async_trait;
use bridgewatch_storage::Storage;
use bridgewatch_types::{platforms, Height, InteropBlock, PendingSwap};
use std::sync::Arc;
use tracing::{debug, info};

const PLATFORM: &str = platforms::ETHEREUM;
const CHAIN: &str = platforms::ETHEREUM;

/// Height-tracking watcher for Ethereum.
///
/// The first `update` replays swaps from every block already in the cache
/// without touching the chain. Every later call processes at most one
/// eligible height past the cursor, or a bounded batch when catch-up is
/// enabled and the watcher is far enough behind. The cursor is persisted
/// after each height's swaps are built, so a crash before settlement can
/// re-emit swaps; settlement deduplicates by (platform, source tx hash).
pub struct EthereumWatcher {
    api: Arc<dyn EthApi>,
    oracle: Arc<dyn Oracle>,
    processor: EventProcessor,
    retry: RetryScheduler,
    local_address: String,
    cursor: Height,
    confirmations: u64,
    catch_up_threshold: Option<u64>,
    recovered: bool,
}

impl EthereumWatcher {
    pub async fn new(
        config: &EthereumConfig,
        api: Arc<dyn EthApi>,
        storage: Arc<dyn Storage>,
        retry: RetryScheduler,
    ) -> Result<Self, WatcherError> {
        let local_address = Self::derive_address(&config.credential)?;

        let crawler = BlockCrawler::new(api.clone(), config, &local_address)
            .map_err(|e| WatcherError::Config(format!("invalid bridge address: {}", e)))?;
        let oracle: Arc<dyn Oracle> =
            Arc::new(OracleReader::new(storage).with_source(PLATFORM, CHAIN, Arc::new(crawler)));

        Self::with_oracle(config, api, oracle, local_address, retry).await
    }

    /// Builds a watcher over an existing oracle. The bridge address must be
    /// the one the oracle's crawler filters on.
    pub async fn with_oracle(
        config: &EthereumConfig,
        api: Arc<dyn EthApi>,
        oracle: Arc<dyn Oracle>,
        local_address: String,
        retry: RetryScheduler,
    ) -> Result<Self, WatcherError> {
        let persisted = retry
            .run("load ethereum cursor", || oracle.current_height(PLATFORM, CHAIN))
            .await?;

        let cursor = match persisted {
            Some(value) => value
                .trim()
                .parse::<Height>()
                .map_err(|e| WatcherError::Config(format!("persisted cursor {:?} is not a height: {}", value, e)))?,
            None => config.start_height,
        };

        info!(
            "Ethereum watcher for {} starting at height {} ({} confirmations)",
            local_address, cursor, config.confirmations
        );

        let processor = EventProcessor::new(oracle.clone(), retry.clone(), PLATFORM, CHAIN);

        Ok(Self {
            api,
            oracle,
            processor,
            retry,
            local_address,
            cursor,
            confirmations: config.confirmations,
            catch_up_threshold: config.catch_up_threshold,
            recovered: false,
        })
    }

    pub fn cursor(&self) -> Height {
        self.cursor
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    async fn recover(&self) -> Result<Vec<PendingSwap>, WatcherError> {
        let blocks = self
            .retry
            .run("read cached ethereum blocks", || self.oracle.read_all_blocks(PLATFORM, CHAIN))
            .await?;

        let mut swaps = Vec::new();
        for block in &blocks {
            self.processor.process_block(block, &mut swaps).await?;
        }

        info!("Recovered {} cached blocks with {} swaps", blocks.len(), swaps.len());
        Ok(swaps)
    }

    async fn head(&self) -> Result<Height, WatcherError> {
        self.retry
            .run("ethereum head", move || async move {
                self.api.block_number().await.map_err(anyhow::Error::from)
            })
            .await
    }

    async fn poll(&mut self) -> Result<Vec<PendingSwap>, WatcherError> {
        let head = self.head().await?;
        debug!("ethereum head {} cursor {}", head, self.cursor);

        if head <= self.cursor {
            return Ok(Vec::new());
        }

        let eligible = head.saturating_sub(self.confirmations);
        if eligible <= self.cursor {
            debug!(
                "Waiting for confirmations: next height {} eligible at head {}",
                self.cursor + 1,
                self.cursor + 1 + self.confirmations
            );
            return Ok(Vec::new());
        }

        match self.catch_up_threshold {
            Some(threshold) if eligible - self.cursor > threshold => self.catch_up(eligible).await,
            _ => {
                let mut swaps = Vec::new();
                self.process_height(self.cursor + 1, &mut swaps).await?;
                Ok(swaps)
            }
        }
    }

    async fn process_height(&mut self, height: Height, swaps: &mut Vec<PendingSwap>) -> Result<(), WatcherError> {
        let label = format!("read ethereum block {}", height);
        let block = self
            .retry
            .run(&label, || self.oracle.read_block(PLATFORM, CHAIN, height))
            .await?;

        self.apply_block(height, &block, swaps).await
    }

    /// Fetches up to `MAX_BATCH_SIZE` eligible heights concurrently, then
    /// applies them strictly in height order.
    async fn catch_up(&mut self, eligible: Height) -> Result<Vec<PendingSwap>, WatcherError> {
        let heights = BatchHeights::Range {
            start: self.cursor + 1,
            count: MAX_BATCH_SIZE,
            head: eligible,
        };
        info!("Catching up ethereum from {} ({} behind)", self.cursor + 1, eligible - self.cursor);

        let blocks = self
            .retry
            .run_batch("read ethereum block", &heights, |height| {
                self.oracle.read_block(PLATFORM, CHAIN, height)
            })
            .await?;

        let mut swaps = Vec::new();
        for (height, block) in blocks {
            self.apply_block(height, &block, &mut swaps).await?;
        }
        Ok(swaps)
    }

    async fn apply_block(
        &mut self,
        height: Height,
        block: &InteropBlock,
        swaps: &mut Vec<PendingSwap>,
    ) -> Result<(), WatcherError> {
        let before = swaps.len();
        self.processor.process_block(block, swaps).await?;
        self.advance_cursor(height).await?;

        let found = swaps.len() - before;
        if found > 0 {
            info!("Found {} swaps in ethereum block {}", found, height);
        }
        Ok(())
    }

    async fn advance_cursor(&mut self, height: Height) -> Result<(), WatcherError> {
        let value = height.to_string();
        self.retry
            .run("persist ethereum cursor", || self.oracle.set_current_height(PLATFORM, CHAIN, &value))
            .await?;
        self.cursor = height;
        Ok(())
    }
}

#[async_trait]
impl PlatformWatcher for EthereumWatcher {
    fn platform_name(&self) -> &str {
        PLATFORM
    }

    fn local_address(&self) -> &str {
        &self.local_address
    }

    async fn update(&mut self) -> Result<Vec<PendingSwap>, WatcherError> {
        if !self.recovered {
            let swaps = self.recover().await?;
            self.recovered = true;
            return Ok(swaps);
        }

        self.poll().await
    }

    fn derive_address(credential: &str) -> Result<String, WatcherError> {
        derive_eth_address(credential).map_err(|e| WatcherError::Config(e.to_string()))
    }
}
