use crate::storage_trait::{chain_key, ChainKey, Storage, StorageError};
use bridgewatch_types::{Height, InteropBlock, InteropTransaction, TxHash};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct InMemoryStorage {
    blocks: Arc<RwLock<HashMap<ChainKey, BTreeMap<Height, InteropBlock>>>>,
    transactions: Arc<RwLock<HashMap<(ChainKey, TxHash), InteropTransaction>>>,
    heights: Arc<RwLock<HashMap<ChainKey, String>>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read()
        .map_err(|_| StorageError::DatabaseError("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write()
        .map_err(|_| StorageError::DatabaseError("lock poisoned".to_string()))
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(HashMap::new())),
            heights: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn block_count(&self, platform: &str, chain: &str) -> usize {
        read(&self.blocks)
            .map(|blocks| blocks.get(&chain_key(platform, chain)).map_or(0, |b| b.len()))
            .unwrap_or(0)
    }
}

impl Storage for InMemoryStorage {
    fn get_current_height(&self, platform: &str, chain: &str) -> Result<Option<String>, StorageError> {
        let heights = read(&self.heights)?;
        Ok(heights.get(&chain_key(platform, chain)).cloned())
    }

    fn set_current_height(&self, platform: &str, chain: &str, height: &str) -> Result<(), StorageError> {
        let mut heights = write(&self.heights)?;
        heights.insert(chain_key(platform, chain), height.to_string());
        Ok(())
    }

    fn save_block(
        &self,
        height: Height,
        block: &InteropBlock,
        transactions: &[InteropTransaction],
    ) -> Result<(), StorageError> {
        let key = chain_key(block.platform(), block.chain());

        {
            let mut txs = write(&self.transactions)?;
            for tx in transactions.iter().filter(|tx| !tx.hash().is_null()) {
                txs.insert((key.clone(), tx.hash()), tx.clone());
            }
        }

        let mut blocks = write(&self.blocks)?;
        blocks.entry(key).or_default().insert(height, block.clone());
        Ok(())
    }

    fn get_block(&self, platform: &str, chain: &str, height: Height) -> Result<Option<InteropBlock>, StorageError> {
        let blocks = read(&self.blocks)?;
        Ok(blocks
            .get(&chain_key(platform, chain))
            .and_then(|by_height| by_height.get(&height))
            .cloned())
    }

    fn get_all_blocks(&self, platform: &str, chain: &str) -> Result<Vec<InteropBlock>, StorageError> {
        let blocks = read(&self.blocks)?;
        Ok(blocks
            .get(&chain_key(platform, chain))
            .map(|by_height| by_height.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &TxHash,
    ) -> Result<Option<InteropTransaction>, StorageError> {
        let txs = read(&self.transactions)?;
        Ok(txs.get(&(chain_key(platform, chain), *hash)).cloned())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgewatch_types::{HomeAddress, InteropTransfer};

    fn hash(byte: u8) -> TxHash {
        TxHash([byte; 32])
    }

    fn tx(byte: u8) -> InteropTransaction {
        let mut key = [byte; 33];
        key[0] = 0x03;
        InteropTransaction::new(
            hash(byte),
            vec![InteropTransfer {
                source_platform: "ethereum".to_string(),
                source_address: "0xaa".to_string(),
                destination_platform: "home".to_string(),
                destination_address: "0xbb".to_string(),
                interop_address: HomeAddress::from_compressed_key(&key),
                symbol: "TOKEN".to_string(),
                amount: 500u32.into(),
            }],
        )
    }

    #[test]
    fn test_cursor_round_trip() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get_current_height("ethereum", "ethereum").unwrap(), None);

        storage.set_current_height("ethereum", "ethereum", "120").unwrap();
        assert_eq!(
            storage.get_current_height("ethereum", "ethereum").unwrap(),
            Some("120".to_string())
        );
        assert_eq!(storage.get_current_height("ethereum", "other").unwrap(), None);
    }

    #[test]
    fn test_blocks_are_returned_in_height_order() {
        let storage = InMemoryStorage::new();
        let txs = [tx(1), tx(2), tx(3)];

        for (height, t) in [(30u64, &txs[2]), (10, &txs[0]), (20, &txs[1])] {
            let block = InteropBlock::from_transactions("ethereum", "ethereum", std::slice::from_ref(t));
            storage.save_block(height, &block, std::slice::from_ref(t)).unwrap();
        }

        let all = storage.get_all_blocks("ethereum", "ethereum").unwrap();
        let hashes: Vec<TxHash> = all.iter().map(|b| b.hash()).collect();
        assert_eq!(hashes, vec![hash(1), hash(2), hash(3)]);
        assert_eq!(storage.block_count("ethereum", "ethereum"), 3);
    }

    #[test]
    fn test_transaction_lookup_is_scoped_to_chain() {
        let storage = InMemoryStorage::new();
        let t = tx(4);
        let block = InteropBlock::from_transactions("ethereum", "ethereum", std::slice::from_ref(&t));
        storage.save_block(7, &block, std::slice::from_ref(&t)).unwrap();

        assert_eq!(storage.get_transaction("ethereum", "ethereum", &hash(4)).unwrap(), Some(t));
        assert_eq!(storage.get_transaction("ethereum", "other", &hash(4)).unwrap(), None);
        assert!(storage.get_block("ethereum", "ethereum", 7).unwrap().is_some());
        assert!(storage.get_block("ethereum", "ethereum", 8).unwrap().is_none());
    }
}
