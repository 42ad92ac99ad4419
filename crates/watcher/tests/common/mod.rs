#![allow(dead_code)]

use async_trait::async_trait;
use bridgewatch_storage::InMemoryStorage;
use bridgewatch_watcher::crawler::transfer_topic;
use bridgewatch_watcher::eth_api::{EthApi, EthBlock};
use bridgewatch_watcher::signature::{format_address, signing_hash};
use bridgewatch_watcher::{
    ContractConfig, EthereumConfig, EthereumWatcher, RetryPolicy, RetryScheduler, RpcError,
};
use ethers::abi::{encode, Token};
use ethers::types::{Address, Log, Transaction, TransactionReceipt, H256, U256, U64};
use ethers::utils::{keccak256, secret_key_to_address};
use k256::ecdsa::SigningKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const BRIDGE_CREDENTIAL: &str = "4646464646464646464646464646464646464646464646464646464646464646";
pub const BRIDGE: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";
pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const UNLISTED_TOKEN: &str = "0x2222222222222222222222222222222222222222";
pub const STRANGER: &str = "0x3333333333333333333333333333333333333333";

pub fn address(text: &str) -> Address {
    text.parse().unwrap()
}

#[derive(Default)]
struct ChainState {
    head: u64,
    blocks: HashMap<u64, EthBlock>,
    receipts: HashMap<H256, TransactionReceipt>,
    failures: u32,
    wrong_receipts: u32,
}

/// In-memory chain. Every call consumes one injected failure first, if any.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
    head_calls: AtomicUsize,
    block_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.set_head(head);
        Arc::new(chain)
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn add_block(&self, height: u64, txs: Vec<(Transaction, TransactionReceipt)>) {
        let mut state = self.state.lock().unwrap();
        let mut transactions = Vec::new();
        for (tx, receipt) in txs {
            state.receipts.insert(tx.hash, receipt);
            transactions.push(tx);
        }
        state.blocks.insert(
            height,
            EthBlock {
                number: height,
                hash: Some(H256::from_low_u64_be(height)),
                transactions,
            },
        );
    }

    pub fn add_empty_blocks(&self, heights: std::ops::RangeInclusive<u64>) {
        for height in heights {
            self.add_block(height, Vec::new());
        }
    }

    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures = count;
    }

    /// The next `count` receipts are served with a foreign transaction hash,
    /// as a misbehaving node behind a load balancer would.
    pub fn serve_wrong_receipts(&self, count: u32) {
        self.state.lock().unwrap().wrong_receipts = count;
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    fn take_failure(state: &mut ChainState) -> Result<(), RpcError> {
        if state.failures > 0 {
            state.failures -= 1;
            return Err(RpcError::Rpc {
                code: -32000,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EthApi for MockChain {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        Ok(state.head)
    }

    async fn block_with_transactions(&self, height: u64) -> Result<EthBlock, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        state
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| RpcError::NullResult("eth_getBlockByNumber".to_string()))
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt, RpcError> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        let mut receipt = state
            .receipts
            .get(&hash)
            .cloned()
            .ok_or_else(|| RpcError::NullResult("eth_getTransactionReceipt".to_string()))?;

        if state.wrong_receipts > 0 {
            state.wrong_receipts -= 1;
            receipt.transaction_hash = H256::repeat_byte(0xee);
        }
        Ok(receipt)
    }
}

pub fn user_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

pub fn user_address(key: &SigningKey) -> String {
    format_address(&secret_key_to_address(key))
}

/// EIP-1559 transaction signed by `key`.
pub fn signed_tx(key: &SigningKey, nonce: u64, to: &str, value: u64) -> Transaction {
    let sender = secret_key_to_address(key);
    let hash = keccak256([sender.as_bytes(), &nonce.to_be_bytes()].concat());

    let mut tx = Transaction {
        hash: H256(hash),
        transaction_type: Some(U64::from(2)),
        chain_id: Some(U256::one()),
        nonce: U256::from(nonce),
        from: sender,
        to: Some(address(to)),
        value: U256::from(value),
        gas: U256::from(60_000),
        max_fee_per_gas: Some(U256::from(30_000_000_000u64)),
        max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
        ..Default::default()
    };

    let prehash = signing_hash(&tx).unwrap();
    let (signature, recovery_id) = key.sign_prehash_recoverable(prehash.as_bytes()).unwrap();
    let (r, s) = signature.split_bytes();
    tx.r = U256::from_big_endian(&r);
    tx.s = U256::from_big_endian(&s);
    tx.v = U64::from(recovery_id.to_byte());
    tx
}

pub fn transfer_log(tx: &Transaction, contract: &str, from: &str, to: &str, amount: u64) -> Log {
    Log {
        address: address(contract),
        topics: vec![transfer_topic(), H256::from(address(from)), H256::from(address(to))],
        data: encode(&[Token::Uint(U256::from(amount))]).into(),
        transaction_hash: Some(tx.hash),
        ..Default::default()
    }
}

pub fn receipt(tx: &Transaction, status: u64, logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx.hash,
        status: Some(U64::from(status)),
        logs,
        ..Default::default()
    }
}

/// A token transfer of `amount` TOKEN from `key`'s address to `to`.
pub fn token_transfer(key: &SigningKey, nonce: u64, to: &str, amount: u64) -> (Transaction, TransactionReceipt) {
    let tx = signed_tx(key, nonce, TOKEN, 0);
    let log = transfer_log(&tx, TOKEN, &user_address(key), to, amount);
    let receipt = receipt(&tx, 1, vec![log]);
    (tx, receipt)
}

pub fn config(start_height: u64, confirmations: u64) -> EthereumConfig {
    EthereumConfig {
        rpc_url: String::new(),
        credential: BRIDGE_CREDENTIAL.to_string(),
        start_height,
        contracts: vec![ContractConfig {
            address: TOKEN.to_string(),
            symbol: "TOKEN".to_string(),
        }],
        confirmations,
        rpc_timeout_seconds: 1,
        catch_up_threshold: None,
        home_platform: "home".to_string(),
    }
}

pub fn scheduler(cancel: CancellationToken) -> RetryScheduler {
    RetryScheduler::new(RetryPolicy::default(), cancel)
}

pub async fn watcher(
    chain: &Arc<MockChain>,
    storage: &Arc<InMemoryStorage>,
    config: &EthereumConfig,
) -> EthereumWatcher {
    EthereumWatcher::new(
        config,
        chain.clone(),
        storage.clone(),
        scheduler(CancellationToken::new()),
    )
    .await
    .unwrap()
}
