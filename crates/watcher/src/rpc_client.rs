use crate::error::RpcError;
use crate::eth_api::{EthApi, EthBlock};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError as _};
use ethers::types::{Block, Transaction, TransactionReceipt, H256, U64};
use serde_json::Value;
use std::time::Duration;
use tracing::{trace, warn};
use url::Url;

/// Single-shot JSON-RPC client over an ethers HTTP provider. Failures are
/// returned as-is; retrying is the caller's concern.
pub struct RpcClient {
    provider: Provider<Http>,
}

impl RpcClient {
    pub fn new(rpc_url: &str, timeout_seconds: u64) -> Result<Self, RpcError> {
        let url = Url::parse(rpc_url).map_err(|e| RpcError::InvalidUrl(format!("{}: {}", rpc_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            provider: Provider::new(Http::new_with_client(url, client)),
        })
    }
}

fn classify(error: ProviderError) -> RpcError {
    if let Some(response) = error.as_error_response() {
        // Handle rate limiting
        if response.code == -32005 || response.code == 429 {
            return RpcError::RateLimited(response.message.clone());
        }
        return RpcError::Rpc {
            code: response.code,
            message: response.message.clone(),
        };
    }
    RpcError::Provider(error)
}

/// Decodes each transaction on its own so one odd entry does not hide the
/// rest of the block.
pub(crate) fn decode_block(block: Block<Value>) -> Result<EthBlock, RpcError> {
    let number = block
        .number
        .ok_or_else(|| RpcError::InvalidResponse("block has no number".to_string()))?
        .as_u64();

    let transactions = block
        .transactions
        .into_iter()
        .filter_map(|raw| {
            let hash = raw.get("hash").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<Transaction>(raw) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    warn!("Skipping undecodable tx {} in block {}: {}", hash, number, e);
                    None
                }
            }
        })
        .collect();

    Ok(EthBlock {
        number,
        hash: block.hash,
        transactions,
    })
}

#[async_trait]
impl EthApi for RpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        trace!("eth_blockNumber");
        let number = self.provider.get_block_number().await.map_err(classify)?;
        Ok(number.as_u64())
    }

    async fn block_with_transactions(&self, height: u64) -> Result<EthBlock, RpcError> {
        trace!(height, "eth_getBlockByNumber");
        let block: Option<Block<Value>> = self
            .provider
            .request("eth_getBlockByNumber", (U64::from(height), true))
            .await
            .map_err(classify)?;

        match block {
            Some(block) => decode_block(block),
            None => Err(RpcError::NullResult("eth_getBlockByNumber".to_string())),
        }
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt, RpcError> {
        trace!(?hash, "eth_getTransactionReceipt");
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(classify)?
            .ok_or_else(|| RpcError::NullResult("eth_getTransactionReceipt".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_tx(hash_byte: u8) -> Value {
        json!({
            "hash": format!("0x{}", format!("{:02x}", hash_byte).repeat(32)),
            "nonce": "0x9",
            "blockHash": null,
            "blockNumber": null,
            "transactionIndex": null,
            "from": "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f",
            "to": "0x3535353535353535353535353535353535353535",
            "value": "0xde0b6b3a7640000",
            "gasPrice": "0x4a817c800",
            "gas": "0x5208",
            "input": "0x",
            "v": "0x25",
            "r": "0x28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276",
            "s": "0x67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        })
    }

    fn block_json(transactions: Vec<Value>) -> Value {
        json!({
            "hash": format!("0x{}", "ab".repeat(32)),
            "parentHash": format!("0x{}", "00".repeat(32)),
            "sha3Uncles": format!("0x{}", "00".repeat(32)),
            "miner": "0x0000000000000000000000000000000000000000",
            "stateRoot": format!("0x{}", "00".repeat(32)),
            "transactionsRoot": format!("0x{}", "00".repeat(32)),
            "receiptsRoot": format!("0x{}", "00".repeat(32)),
            "number": "0x64",
            "gasUsed": "0x0",
            "gasLimit": "0x0",
            "extraData": "0x",
            "logsBloom": null,
            "timestamp": "0x0",
            "difficulty": "0x0",
            "totalDifficulty": null,
            "sealFields": [],
            "uncles": [],
            "transactions": transactions,
            "size": null,
            "mixHash": null,
            "nonce": null
        })
    }

    #[test]
    fn test_decode_block() {
        let block: Block<Value> = serde_json::from_value(block_json(vec![legacy_tx(1)])).unwrap();
        let decoded = decode_block(block).unwrap();

        assert_eq!(decoded.number, 100);
        assert_eq!(decoded.transactions.len(), 1);
        assert_eq!(decoded.transactions[0].hash, H256::repeat_byte(1));
        assert_eq!(decoded.transactions[0].v, U64::from(37));
    }

    #[test]
    fn test_decode_block_skips_malformed_transaction() {
        let mut broken = legacy_tx(2);
        broken["value"] = json!("not-a-quantity");

        let block: Block<Value> =
            serde_json::from_value(block_json(vec![legacy_tx(1), broken, legacy_tx(3)])).unwrap();
        let decoded = decode_block(block).unwrap();

        let hashes: Vec<H256> = decoded.transactions.iter().map(|tx| tx.hash).collect();
        assert_eq!(hashes, vec![H256::repeat_byte(1), H256::repeat_byte(3)]);
    }

    #[test]
    fn test_pending_block_is_invalid() {
        let mut json = block_json(Vec::new());
        json["number"] = Value::Null;
        let block: Block<Value> = serde_json::from_value(json).unwrap();
        assert!(matches!(decode_block(block), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(RpcClient::new("not a url", 5), Err(RpcError::InvalidUrl(_))));
        assert!(RpcClient::new("http://localhost:8545", 5).is_ok());
    }
}
