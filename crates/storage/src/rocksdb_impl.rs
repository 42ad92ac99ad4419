use crate::storage_trait::{Storage, StorageError};
use bridgewatch_types::{Height, InteropBlock, InteropTransaction, TxHash};
use rocksdb_rs::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;

const CF_BLOCKS: &str = "blocks";
const CF_TRANSACTIONS: &str = "transactions";
const CF_HEIGHTS: &str = "heights";

pub struct RocksDBStorage {
    db: Arc<DB>,
}

impl RocksDBStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_HEIGHTS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::DatabaseError(format!("{} not found", name)))
    }

    fn chain_prefix(platform: &str, chain: &str) -> Result<Vec<u8>, StorageError> {
        if platform.contains('/') || chain.contains('/') {
            return Err(StorageError::InvalidKey(format!("{}/{}", platform, chain)));
        }
        Ok(format!("{}/{}/", platform, chain).into_bytes())
    }

    // Big-endian so that lexicographic key order is height order.
    fn encode_block_key(platform: &str, chain: &str, height: Height) -> Result<Vec<u8>, StorageError> {
        let mut key = Self::chain_prefix(platform, chain)?;
        key.extend_from_slice(&height.to_be_bytes());
        Ok(key)
    }

    fn encode_tx_key(platform: &str, chain: &str, hash: &TxHash) -> Result<Vec<u8>, StorageError> {
        let mut key = Self::chain_prefix(platform, chain)?;
        key.extend_from_slice(hash.as_bytes());
        Ok(key)
    }
}

impl Storage for RocksDBStorage {
    fn get_current_height(&self, platform: &str, chain: &str) -> Result<Option<String>, StorageError> {
        let key = Self::chain_prefix(platform, chain)?;
        match self
            .db
            .get_cf(self.cf(CF_HEIGHTS)?, key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?
        {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::DeserializationFailed),
            None => Ok(None),
        }
    }

    fn set_current_height(&self, platform: &str, chain: &str, height: &str) -> Result<(), StorageError> {
        let key = Self::chain_prefix(platform, chain)?;
        self.db
            .put_cf(self.cf(CF_HEIGHTS)?, key, height.as_bytes())
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn save_block(
        &self,
        height: Height,
        block: &InteropBlock,
        transactions: &[InteropTransaction],
    ) -> Result<(), StorageError> {
        let tx_cf = self.cf(CF_TRANSACTIONS)?;
        for tx in transactions.iter().filter(|tx| !tx.hash().is_null()) {
            let key = Self::encode_tx_key(block.platform(), block.chain(), &tx.hash())?;
            let value = bincode::serialize(tx).map_err(|_| StorageError::SerializationFailed)?;
            self.db
                .put_cf(tx_cf, key, value)
                .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        }

        // Written last: a block present in the cache implies its transactions are too.
        let key = Self::encode_block_key(block.platform(), block.chain(), height)?;
        let value = bincode::serialize(block).map_err(|_| StorageError::SerializationFailed)?;
        self.db
            .put_cf(self.cf(CF_BLOCKS)?, key, value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn get_block(&self, platform: &str, chain: &str, height: Height) -> Result<Option<InteropBlock>, StorageError> {
        let key = Self::encode_block_key(platform, chain, height)?;
        match self
            .db
            .get_cf(self.cf(CF_BLOCKS)?, key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?
        {
            Some(bytes) => {
                let block: InteropBlock =
                    bincode::deserialize(&bytes).map_err(|_| StorageError::DeserializationFailed)?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn get_all_blocks(&self, platform: &str, chain: &str) -> Result<Vec<InteropBlock>, StorageError> {
        let prefix = Self::chain_prefix(platform, chain)?;
        let iter = self.db.iterator_cf(
            self.cf(CF_BLOCKS)?,
            IteratorMode::From(prefix.as_slice(), Direction::Forward),
        );

        let mut blocks = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::DatabaseError(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let block: InteropBlock =
                bincode::deserialize(&value).map_err(|_| StorageError::DeserializationFailed)?;
            blocks.push(block);
        }

        Ok(blocks)
    }

    fn get_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &TxHash,
    ) -> Result<Option<InteropTransaction>, StorageError> {
        let key = Self::encode_tx_key(platform, chain, hash)?;
        match self
            .db
            .get_cf(self.cf(CF_TRANSACTIONS)?, key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?
        {
            Some(bytes) => {
                let tx: InteropTransaction =
                    bincode::deserialize(&bytes).map_err(|_| StorageError::DeserializationFailed)?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }
}
