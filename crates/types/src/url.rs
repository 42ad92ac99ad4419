use crate::constants::oracle::URL_SCHEME;
use crate::{Height, ParseError, TxHash};
use std::fmt;
use std::str::FromStr;

/// Address of a cached oracle entry, e.g. `interop://ethereum/ethereum/block/42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OracleUrl {
    Block {
        platform: String,
        chain: String,
        height: Height,
    },
    Transaction {
        platform: String,
        chain: String,
        hash: TxHash,
    },
}

impl OracleUrl {
    pub fn block(platform: &str, chain: &str, height: Height) -> Self {
        OracleUrl::Block {
            platform: platform.to_string(),
            chain: chain.to_string(),
            height,
        }
    }

    pub fn transaction(platform: &str, chain: &str, hash: TxHash) -> Self {
        OracleUrl::Transaction {
            platform: platform.to_string(),
            chain: chain.to_string(),
            hash,
        }
    }

    pub fn platform(&self) -> &str {
        match self {
            OracleUrl::Block { platform, .. } | OracleUrl::Transaction { platform, .. } => platform,
        }
    }

    pub fn chain(&self) -> &str {
        match self {
            OracleUrl::Block { chain, .. } | OracleUrl::Transaction { chain, .. } => chain,
        }
    }
}

impl fmt::Display for OracleUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleUrl::Block {
                platform,
                chain,
                height,
            } => write!(f, "{}{}/{}/block/{}", URL_SCHEME, platform, chain, height),
            OracleUrl::Transaction {
                platform,
                chain,
                hash,
            } => write!(f, "{}{}/{}/tx/{}", URL_SCHEME, platform, chain, hash),
        }
    }
}

impl FromStr for OracleUrl {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidUrl(s.to_string());

        let rest = s.strip_prefix(URL_SCHEME).ok_or_else(invalid)?;
        let parts: Vec<&str> = rest.split('/').collect();
        let [platform, chain, kind, id] = parts.as_slice() else {
            return Err(invalid());
        };
        if platform.is_empty() || chain.is_empty() {
            return Err(invalid());
        }

        match *kind {
            "block" => Ok(OracleUrl::block(
                platform,
                chain,
                id.parse().map_err(|_| invalid())?,
            )),
            "tx" => Ok(OracleUrl::transaction(platform, chain, id.parse()?)),
            _ => Err(invalid()),
        }
    }
}
