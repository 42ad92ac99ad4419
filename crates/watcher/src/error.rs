use ethers::providers::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid RPC url: {0}")]
    InvalidUrl(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("RPC error ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("null result for {0}, possible connection failure")]
    NullResult(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid transfer event: {0}")]
    Event(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported transaction type {0}")]
    UnsupportedTransactionType(u64),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("watcher cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}
