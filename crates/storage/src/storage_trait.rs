use bridgewatch_types::{Height, InteropBlock, InteropTransaction, TxHash};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("entry not found")]
    NotFound,
    #[error("serialization failed")]
    SerializationFailed,
    #[error("deserialization failed")]
    DeserializationFailed,
    #[error("database error: {0}")]
    DatabaseError(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Durable cache behind the oracle: per-(platform, chain) height cursors and
/// the interop blocks and transactions crawled for each height.
pub trait Storage: Send + Sync {
    fn get_current_height(&self, platform: &str, chain: &str) -> Result<Option<String>, StorageError>;
    fn set_current_height(&self, platform: &str, chain: &str, height: &str) -> Result<(), StorageError>;

    /// Stores a crawled block together with its transactions. Keys come from
    /// the block's own platform and chain.
    fn save_block(
        &self,
        height: Height,
        block: &InteropBlock,
        transactions: &[InteropTransaction],
    ) -> Result<(), StorageError>;
    fn get_block(&self, platform: &str, chain: &str, height: Height) -> Result<Option<InteropBlock>, StorageError>;

    /// All cached blocks for (platform, chain), ordered by height.
    fn get_all_blocks(&self, platform: &str, chain: &str) -> Result<Vec<InteropBlock>, StorageError>;

    fn get_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &TxHash,
    ) -> Result<Option<InteropTransaction>, StorageError>;

    fn flush(&self) -> Result<(), StorageError>;
}

pub type ChainKey = (String, String);

pub fn chain_key(platform: &str, chain: &str) -> ChainKey {
    (platform.to_string(), chain.to_string())
}
