use crate::error::WatcherError;
use crate::oracle::Oracle;
use crate::retry::RetryScheduler;
use bridgewatch_types::{InteropBlock, PendingSwap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns stored interop blocks into pending swaps.
pub struct EventProcessor {
    oracle: Arc<dyn Oracle>,
    retry: RetryScheduler,
    platform: String,
    chain: String,
}

impl EventProcessor {
    pub fn new(oracle: Arc<dyn Oracle>, retry: RetryScheduler, platform: &str, chain: &str) -> Self {
        Self {
            oracle,
            retry,
            platform: platform.to_string(),
            chain: chain.to_string(),
        }
    }

    /// Appends one swap per transfer of every transaction in `block`, in
    /// block order.
    pub async fn process_block(&self, block: &InteropBlock, swaps: &mut Vec<PendingSwap>) -> Result<(), WatcherError> {
        for hash in block.transactions() {
            let label = format!("read {} tx {}", self.platform, hash);
            let tx = self
                .retry
                .run(&label, || self.oracle.read_transaction(&self.platform, &self.chain, hash))
                .await?;

            let Some(tx) = tx else {
                warn!("Transaction {} listed in block but not cached, skipping", hash);
                continue;
            };

            let found = PendingSwap::from_transaction(&self.platform, &tx);
            debug!("tx {}: {} swaps", hash, found.len());
            swaps.extend(found);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleReader;
    use crate::retry::RetryPolicy;
    use bridgewatch_storage::{InMemoryStorage, Storage};
    use bridgewatch_types::{HomeAddress, InteropTransaction, InteropTransfer, TxHash};
    use tokio_util::sync::CancellationToken;

    fn transfer(source: &str) -> InteropTransfer {
        InteropTransfer {
            source_platform: "ethereum".to_string(),
            source_address: source.to_string(),
            destination_platform: "home".to_string(),
            destination_address: "0xbridge".to_string(),
            interop_address: HomeAddress::from_compressed_key(&[3; 33]),
            symbol: "TOKEN".to_string(),
            amount: 1u32.into(),
        }
    }

    #[tokio::test]
    async fn test_process_block_emits_one_swap_per_transfer() {
        let storage = Arc::new(InMemoryStorage::new());
        let tx_a = InteropTransaction::new(TxHash([1; 32]), vec![transfer("0xa1"), transfer("0xa2")]);
        let tx_b = InteropTransaction::new(TxHash([2; 32]), vec![transfer("0xb1")]);
        let block = InteropBlock::from_transactions("ethereum", "ethereum", &[tx_a.clone(), tx_b.clone()]);
        storage.save_block(5, &block, &[tx_a, tx_b]).unwrap();

        let processor = EventProcessor::new(
            Arc::new(OracleReader::new(storage)),
            RetryScheduler::new(RetryPolicy::default(), CancellationToken::new()),
            "ethereum",
            "ethereum",
        );

        let mut swaps = Vec::new();
        processor.process_block(&block, &mut swaps).await.unwrap();

        let sources: Vec<&str> = swaps.iter().map(|s| s.source_address.as_str()).collect();
        assert_eq!(sources, vec!["0xa1", "0xa2", "0xb1"]);
        assert!(swaps[..2].iter().all(|s| s.hash == TxHash([1; 32])));
        assert_eq!(swaps[2].hash, TxHash([2; 32]));
    }

    #[tokio::test]
    async fn test_missing_transaction_is_skipped() {
        let block = InteropBlock::new("ethereum", "ethereum", TxHash([7; 32]), vec![TxHash([7; 32])]);
        let processor = EventProcessor::new(
            Arc::new(OracleReader::new(Arc::new(InMemoryStorage::new()))),
            RetryScheduler::new(RetryPolicy::default(), CancellationToken::new()),
            "ethereum",
            "ethereum",
        );

        let mut swaps = Vec::new();
        processor.process_block(&block, &mut swaps).await.unwrap();
        assert!(swaps.is_empty());
    }
}
