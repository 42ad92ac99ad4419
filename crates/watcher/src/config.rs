use crate::error::WatcherError;
use bridgewatch_types::platforms;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const DEFAULT_RPC_URL: &str = "https://eth.llamarpc.com";
const DEFAULT_CONFIRMATIONS: u64 = 12;
const DEFAULT_RPC_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumConfig {
    pub rpc_url: String,
    /// WIF or raw hex private key; the bridge address is derived from it.
    #[serde(skip_serializing)]
    pub credential: String,
    /// Cursor used when nothing has been persisted yet. The first processed
    /// height is `start_height + 1`.
    pub start_height: u64,
    pub contracts: Vec<ContractConfig>,
    pub confirmations: u64,
    pub rpc_timeout_seconds: u64,
    /// Batch catch-up kicks in when more than this many heights are eligible.
    pub catch_up_threshold: Option<u64>,
    pub home_platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub platforms: Vec<String>,
    pub poll_interval_seconds: u64,
    pub ethereum: EthereumConfig,
}

/// Parses `0xabc..=USDT,0xdef..=DAI`. Empty entries are ignored; an entry
/// missing its address or symbol is an error.
pub fn parse_contracts(value: &str) -> Result<Vec<ContractConfig>, WatcherError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parsed = entry
                .split_once('=')
                .map(|(address, symbol)| (address.trim(), symbol.trim()))
                .filter(|(address, symbol)| !address.is_empty() && !symbol.is_empty());

            match parsed {
                Some((address, symbol)) => Ok(ContractConfig {
                    address: address.to_string(),
                    symbol: symbol.to_string(),
                }),
                None => Err(WatcherError::Config(format!(
                    "ETH_CONTRACTS: malformed entry {:?}, expected ADDRESS=SYMBOL",
                    entry
                ))),
            }
        })
        .collect()
}

/// Typed view over a variable source. Present but unparsable values are
/// configuration errors naming the variable.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, WatcherError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| WatcherError::Config(format!("{}: invalid value {:?}: {}", key, raw, e))),
        }
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, WatcherError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }
}

impl EthereumConfig {
    pub fn from_env() -> Result<Self, WatcherError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WatcherError> {
        Self::read(&Env { lookup })
    }

    fn read<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, WatcherError> {
        let defaults = Self::default();
        Ok(Self {
            rpc_url: env.string("ETH_RPC_URL").unwrap_or(defaults.rpc_url),
            credential: env.string("ETH_WIF").unwrap_or_default(),
            start_height: env.parse_or("ETH_START_HEIGHT", defaults.start_height)?,
            contracts: match env.string("ETH_CONTRACTS") {
                Some(value) => parse_contracts(&value)?,
                None => Vec::new(),
            },
            confirmations: env.parse_or("ETH_CONFIRMATIONS", defaults.confirmations)?,
            rpc_timeout_seconds: env.parse_or("ETH_RPC_TIMEOUT_SECONDS", defaults.rpc_timeout_seconds)?,
            catch_up_threshold: env.parse("ETH_CATCH_UP_THRESHOLD")?,
            home_platform: env.string("HOME_PLATFORM").unwrap_or(defaults.home_platform),
        })
    }
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self, WatcherError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WatcherError> {
        let env = Env { lookup };

        let platforms = match env.string("WATCHED_PLATFORMS") {
            Some(value) => value
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            None => vec![platforms::ETHEREUM.to_string()],
        };

        let poll_interval_seconds = env.parse_or("POLL_INTERVAL_SECONDS", DEFAULT_POLL_INTERVAL_SECONDS)?;
        if poll_interval_seconds == 0 {
            return Err(WatcherError::Config(
                "POLL_INTERVAL_SECONDS: must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            platforms,
            poll_interval_seconds,
            ethereum: EthereumConfig::read(&env)?,
        })
    }
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            credential: String::new(),
            start_height: 0,
            contracts: Vec::new(),
            confirmations: DEFAULT_CONFIRMATIONS,
            rpc_timeout_seconds: DEFAULT_RPC_TIMEOUT_SECONDS,
            catch_up_threshold: None,
            home_platform: platforms::DEFAULT_HOME_PLATFORM.to_string(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            platforms: vec![platforms::ETHEREUM.to_string()],
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            ethereum: EthereumConfig::default(),
        }
    }
}
