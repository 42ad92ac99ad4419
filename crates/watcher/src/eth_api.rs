use crate::error::RpcError;
use async_trait::async_trait;
use bridgewatch_types::TxHash;
use ethers::types::{Transaction, TransactionReceipt, H256, U256, U64};
use num_bigint::BigUint;

/// A mined block with its full transactions. Transactions the node returned
/// in a shape that does not decode are already dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EthBlock {
    pub number: u64,
    pub hash: Option<H256>,
    pub transactions: Vec<Transaction>,
}

/// The slice of an Ethereum node's API the crawler and watcher rely on.
#[async_trait]
pub trait EthApi: Send + Sync {
    async fn block_number(&self) -> Result<u64, RpcError>;
    async fn block_with_transactions(&self, height: u64) -> Result<EthBlock, RpcError>;
    async fn transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt, RpcError>;
}

pub fn interop_hash(hash: H256) -> TxHash {
    TxHash(hash.0)
}

/// Pre-Byzantium receipts carry no status and are treated as successful.
pub fn receipt_succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status != Some(U64::zero())
}

pub fn to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}
