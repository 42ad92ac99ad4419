mod constants;
mod url;

pub use constants::*;
pub use num_bigint::BigUint;
pub use url::OracleUrl;

use std::fmt;
use std::str::FromStr;

pub type Amount = BigUint;
pub type Height = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid oracle url: {0}")]
    InvalidUrl(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
pub struct TxHash(#[serde(with = "serde_bytes")] pub [u8; hash::HASH_SIZE]);

impl TxHash {
    pub const NULL: TxHash = TxHash(hash::NULL_HASH_BYTES);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; hash::HASH_SIZE] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ParseError::InvalidHex(e.to_string()))?;

        if bytes.len() != hash::HASH_SIZE {
            return Err(ParseError::InvalidLength {
                expected: hash::HASH_SIZE,
                actual: bytes.len(),
            });
        }

        let mut out = [0u8; hash::HASH_SIZE];
        out.copy_from_slice(&bytes);
        Ok(TxHash(out))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Home-chain address: a kind byte followed by a compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HomeAddress(#[serde(with = "serde_bytes")] [u8; address::HOME_ADDRESS_SIZE]);

impl HomeAddress {
    pub fn from_compressed_key(key: &[u8; address::COMPRESSED_PUBLIC_KEY_SIZE]) -> Self {
        let mut bytes = [0u8; address::HOME_ADDRESS_SIZE];
        bytes[0] = address::USER_KIND;
        bytes[1..].copy_from_slice(key);
        HomeAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; address::HOME_ADDRESS_SIZE] {
        &self.0
    }

    pub fn text(&self) -> String {
        format!("{}{}", address::USER_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for HomeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl fmt::Debug for HomeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HomeAddress({})", self.text())
    }
}

impl FromStr for HomeAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(address::USER_PREFIX)
            .ok_or_else(|| ParseError::InvalidAddress(s.to_string()))?;

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ParseError::InvalidAddress(e.to_string()))?;

        if bytes.len() != address::HOME_ADDRESS_SIZE {
            return Err(ParseError::InvalidLength {
                expected: address::HOME_ADDRESS_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] != address::USER_KIND {
            return Err(ParseError::InvalidAddress(s.to_string()));
        }

        let mut out = [0u8; address::HOME_ADDRESS_SIZE];
        out.copy_from_slice(&bytes);
        Ok(HomeAddress(out))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InteropTransfer {
    pub source_platform: String,
    pub source_address: String,
    pub destination_platform: String,
    pub destination_address: String,
    /// Sender re-derived from the transaction signature, in home-chain encoding.
    pub interop_address: HomeAddress,
    pub symbol: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InteropTransaction {
    hash: TxHash,
    transfers: Vec<InteropTransfer>,
}

impl InteropTransaction {
    /// A transaction without transfers always carries the null hash.
    pub fn new(hash: TxHash, transfers: Vec<InteropTransfer>) -> Self {
        let hash = if transfers.is_empty() { TxHash::NULL } else { hash };
        Self { hash, transfers }
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn transfers(&self) -> &[InteropTransfer] {
        &self.transfers
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InteropBlock {
    platform: String,
    chain: String,
    hash: TxHash,
    transactions: Vec<TxHash>,
}

impl InteropBlock {
    pub fn new(platform: &str, chain: &str, hash: TxHash, transactions: Vec<TxHash>) -> Self {
        let hash = if transactions.is_empty() { TxHash::NULL } else { hash };
        Self {
            platform: platform.to_string(),
            chain: chain.to_string(),
            hash,
            transactions,
        }
    }

    /// Builds the block for a crawled height. The block hash is the first
    /// qualifying transaction's hash, or null when nothing qualified.
    pub fn from_transactions(platform: &str, chain: &str, txs: &[InteropTransaction]) -> Self {
        let hashes: Vec<TxHash> = txs
            .iter()
            .map(|tx| tx.hash())
            .filter(|hash| !hash.is_null())
            .collect();
        let hash = hashes.first().copied().unwrap_or(TxHash::NULL);
        Self::new(platform, chain, hash, hashes)
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn transactions(&self) -> &[TxHash] {
        &self.transactions
    }
}

/// One detected deposit awaiting settlement. Amount and asset are looked up
/// from the stored transaction by `hash`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PendingSwap {
    pub platform: String,
    pub hash: TxHash,
    pub source_address: String,
    pub destination_address: HomeAddress,
}

impl PendingSwap {
    pub fn from_transaction(platform: &str, tx: &InteropTransaction) -> Vec<PendingSwap> {
        tx.transfers()
            .iter()
            .map(|transfer| PendingSwap {
                platform: platform.to_string(),
                hash: tx.hash(),
                source_address: transfer.source_address.clone(),
                destination_address: transfer.interop_address,
            })
            .collect()
    }
}
