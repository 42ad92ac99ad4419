use crate::config::EthereumConfig;
use crate::error::{DecodeError, RpcError};
use crate::eth_api::{interop_hash, receipt_succeeded, to_biguint, EthApi, EthBlock};
use crate::signature::{format_address, interop_address, parse_address};
use async_trait::async_trait;
use bridgewatch_types::{assets, platforms, InteropBlock, InteropTransaction, InteropTransfer, TxHash};
use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::types::{Address, Log, Transaction, TransactionReceipt, H256, U256};
use futures::future::try_join_all;
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the interop view of one height. Transport failures are returned
/// as errors so the caller can retry them.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_block(&self, height: u64) -> anyhow::Result<(InteropBlock, Vec<InteropTransaction>)>;
}

/// ERC-20 `Transfer(address,address,uint256)`.
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "Transfer")]
pub struct TransferEvent {
    #[ethevent(indexed)]
    pub from: Address,
    #[ethevent(indexed)]
    pub to: Address,
    pub value: U256,
}

pub fn transfer_topic() -> H256 {
    TransferEvent::signature()
}

pub fn decode_transfer_event(log: &Log) -> Result<TransferEvent, DecodeError> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    <TransferEvent as EthEvent>::decode_log(&raw).map_err(|e| DecodeError::Event(e.to_string()))
}

/// Static contract address to asset symbol table.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    symbols: HashMap<Address, String>,
}

impl AssetTable {
    pub fn from_config(config: &EthereumConfig) -> Self {
        let mut symbols = HashMap::new();
        for contract in &config.contracts {
            match parse_address(&contract.address) {
                Ok(address) => {
                    symbols.insert(address, contract.symbol.clone());
                }
                Err(e) => warn!("Ignoring configured contract {}: {}", contract.address, e),
            }
        }
        Self { symbols }
    }

    pub fn symbol(&self, contract: &Address) -> Option<&str> {
        self.symbols.get(contract).map(String::as_str)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.symbols.keys()
    }
}

// (source, symbol, amount)
type Candidate = (Address, String, BigUint);

pub struct BlockCrawler {
    api: Arc<dyn EthApi>,
    assets: AssetTable,
    watched: HashSet<Address>,
    swap_address: Address,
    home_platform: String,
}

impl BlockCrawler {
    pub fn new(api: Arc<dyn EthApi>, config: &EthereumConfig, swap_address: &str) -> Result<Self, DecodeError> {
        let swap_address = parse_address(swap_address)?;
        let assets = AssetTable::from_config(config);

        let mut watched: HashSet<Address> = assets.addresses().copied().collect();
        watched.insert(swap_address);

        Ok(Self {
            api,
            assets,
            watched,
            swap_address,
            home_platform: config.home_platform.clone(),
        })
    }

    pub async fn crawl(&self, height: u64) -> Result<(InteropBlock, Vec<InteropTransaction>), RpcError> {
        let block = self.api.block_with_transactions(height).await?;
        if block.number != height {
            return Err(RpcError::InvalidResponse(format!(
                "asked for block {}, got {}",
                height, block.number
            )));
        }

        let receipts = try_join_all(
            block
                .transactions
                .iter()
                .map(|tx| self.api.transaction_receipt(tx.hash)),
        )
        .await?;

        // A receipt for the wrong transaction would silently empty the block
        // and the empty block would be cached for good.
        for (tx, receipt) in block.transactions.iter().zip(&receipts) {
            if receipt.transaction_hash != tx.hash {
                return Err(RpcError::InvalidResponse(format!(
                    "receipt {:?} returned for tx {:?} in block {}",
                    receipt.transaction_hash, tx.hash, height
                )));
            }
        }

        let transfers = self.extract_transfers(&block, &receipts);
        let transactions = group_by_transaction(transfers);
        let interop_block = InteropBlock::from_transactions(platforms::ETHEREUM, platforms::ETHEREUM, &transactions);

        debug!(
            "Crawled block {}: {} txs, {} interop txs",
            height,
            block.transactions.len(),
            transactions.len()
        );

        Ok((interop_block, transactions))
    }

    /// Flat list of qualifying transfers in block order, keyed by source
    /// transaction. Receipts must already be matched to their transactions.
    pub fn extract_transfers(
        &self,
        block: &EthBlock,
        receipts: &[TransactionReceipt],
    ) -> Vec<(TxHash, InteropTransfer)> {
        block
            .transactions
            .iter()
            .zip(receipts)
            .flat_map(|(tx, receipt)| {
                let hash = interop_hash(tx.hash);
                self.transfers_for_transaction(tx, receipt)
                    .into_iter()
                    .map(move |transfer| (hash, transfer))
            })
            .collect()
    }

    pub fn transfers_for_transaction(&self, tx: &Transaction, receipt: &TransactionReceipt) -> Vec<InteropTransfer> {
        if !receipt_succeeded(receipt) {
            warn!("tx {:?} failed", tx.hash);
            return Vec::new();
        }

        let mut candidates: Vec<Candidate> = receipt
            .logs
            .iter()
            .filter_map(|log| self.token_candidate(tx, log))
            .collect();

        if !tx.value.is_zero() && tx.to == Some(self.swap_address) {
            candidates.push((tx.from, assets::ETH_SYMBOL.to_string(), to_biguint(tx.value)));
        }

        if candidates.is_empty() {
            return Vec::new();
        }

        let interop_address = match interop_address(tx) {
            Ok(address) => address,
            Err(e) => {
                warn!("Skipping tx {:?}: cannot recover sender: {}", tx.hash, e);
                return Vec::new();
            }
        };

        candidates
            .into_iter()
            .map(|(source, symbol, amount)| InteropTransfer {
                source_platform: platforms::ETHEREUM.to_string(),
                source_address: format_address(&source),
                destination_platform: self.home_platform.clone(),
                destination_address: format_address(&self.swap_address),
                interop_address,
                symbol,
                amount,
            })
            .collect()
    }

    fn token_candidate(&self, tx: &Transaction, log: &Log) -> Option<Candidate> {
        if log.topics.first() != Some(&transfer_topic()) || !self.watched.contains(&log.address) {
            return None;
        }

        let event = match decode_transfer_event(log) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping undecodable transfer event in tx {:?}: {}", tx.hash, e);
                return None;
            }
        };

        let Some(symbol) = self.assets.symbol(&log.address) else {
            debug!("Asset [{:?}] not supported", log.address);
            return None;
        };

        if event.to != self.swap_address {
            return None;
        }

        Some((event.from, symbol.to_string(), to_biguint(event.value)))
    }
}

#[async_trait]
impl BlockSource for BlockCrawler {
    async fn fetch_block(&self, height: u64) -> anyhow::Result<(InteropBlock, Vec<InteropTransaction>)> {
        Ok(self.crawl(height).await?)
    }
}

/// Groups transfers by source transaction, keeping first-seen order.
/// Transactions without transfers never appear in the output.
pub fn group_by_transaction(transfers: Vec<(TxHash, InteropTransfer)>) -> Vec<InteropTransaction> {
    let mut order: Vec<TxHash> = Vec::new();
    let mut grouped: HashMap<TxHash, Vec<InteropTransfer>> = HashMap::new();

    for (hash, transfer) in transfers {
        grouped
            .entry(hash)
            .or_insert_with(|| {
                order.push(hash);
                Vec::new()
            })
            .push(transfer);
    }

    order
        .into_iter()
        .filter_map(|hash| grouped.remove(&hash).map(|transfers| InteropTransaction::new(hash, transfers)))
        .filter(|tx| !tx.hash().is_null())
        .collect()
}
