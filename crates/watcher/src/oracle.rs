use crate::crawler::BlockSource;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bridgewatch_storage::Storage;
use bridgewatch_types::{Height, InteropBlock, InteropTransaction, OracleUrl, TxHash};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleValue {
    Block(InteropBlock),
    Transaction(InteropTransaction),
}

/// Durable, cached boundary between the watchers and the outside world.
/// Every call may fail transiently; callers wrap them in the retry scheduler.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn current_height(&self, platform: &str, chain: &str) -> anyhow::Result<Option<String>>;
    async fn set_current_height(&self, platform: &str, chain: &str, height: &str) -> anyhow::Result<()>;

    /// Fetch-with-cache for the entry `url` names.
    async fn read(&self, url: &OracleUrl) -> anyhow::Result<OracleValue>;

    async fn read_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &TxHash,
    ) -> anyhow::Result<Option<InteropTransaction>>;

    /// Every cached block for (platform, chain) in height order. Never
    /// touches the network.
    async fn read_all_blocks(&self, platform: &str, chain: &str) -> anyhow::Result<Vec<InteropBlock>>;

    async fn read_block(&self, platform: &str, chain: &str, height: Height) -> anyhow::Result<InteropBlock> {
        match self.read(&OracleUrl::block(platform, chain, height)).await? {
            OracleValue::Block(block) => Ok(block),
            OracleValue::Transaction(_) => Err(anyhow!("oracle returned a transaction for block {}", height)),
        }
    }
}

/// Oracle backed by a [`Storage`] cache. Cache misses for blocks are crawled
/// through the source registered for the block's (platform, chain).
pub struct OracleReader {
    storage: Arc<dyn Storage>,
    sources: HashMap<(String, String), Arc<dyn BlockSource>>,
}

impl OracleReader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            sources: HashMap::new(),
        }
    }

    pub fn with_source(mut self, platform: &str, chain: &str, source: Arc<dyn BlockSource>) -> Self {
        self.register_source(platform, chain, source);
        self
    }

    pub fn register_source(&mut self, platform: &str, chain: &str, source: Arc<dyn BlockSource>) {
        self.sources
            .insert((platform.to_string(), chain.to_string()), source);
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn read_block_through(&self, platform: &str, chain: &str, height: Height) -> anyhow::Result<InteropBlock> {
        if let Some(block) = self.storage.get_block(platform, chain, height)? {
            trace!("Cache hit for {}/{} block {}", platform, chain, height);
            return Ok(block);
        }

        let source = self
            .sources
            .get(&(platform.to_string(), chain.to_string()))
            .ok_or_else(|| anyhow!("no block source registered for {}/{}", platform, chain))?;

        let (block, transactions) = source.fetch_block(height).await?;
        self.storage
            .save_block(height, &block, &transactions)
            .with_context(|| format!("failed to cache {}/{} block {}", platform, chain, height))?;

        debug!(
            "Cached {}/{} block {} with {} interop txs",
            platform,
            chain,
            height,
            transactions.len()
        );

        Ok(block)
    }
}

#[async_trait]
impl Oracle for OracleReader {
    async fn current_height(&self, platform: &str, chain: &str) -> anyhow::Result<Option<String>> {
        Ok(self.storage.get_current_height(platform, chain)?)
    }

    async fn set_current_height(&self, platform: &str, chain: &str, height: &str) -> anyhow::Result<()> {
        self.storage.set_current_height(platform, chain, height)?;
        self.storage.flush()?;
        Ok(())
    }

    async fn read(&self, url: &OracleUrl) -> anyhow::Result<OracleValue> {
        match url {
            OracleUrl::Block {
                platform,
                chain,
                height,
            } => Ok(OracleValue::Block(
                self.read_block_through(platform, chain, *height).await?,
            )),
            OracleUrl::Transaction { platform, chain, hash } => self
                .read_transaction(platform, chain, hash)
                .await?
                .map(OracleValue::Transaction)
                .ok_or_else(|| anyhow!("{} is not cached", url)),
        }
    }

    async fn read_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &TxHash,
    ) -> anyhow::Result<Option<InteropTransaction>> {
        Ok(self.storage.get_transaction(platform, chain, hash)?)
    }

    async fn read_all_blocks(&self, platform: &str, chain: &str) -> anyhow::Result<Vec<InteropBlock>> {
        Ok(self.storage.get_all_blocks(platform, chain)?)
    }
}
