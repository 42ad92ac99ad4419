//! Sender recovery for Ethereum transactions.
//!
//! The credited party of a deposit is whoever signed the transaction, so the
//! signing hash is rebuilt from the transaction fields and the public key is
//! recovered from (r, s, v). The node's `from` field is never consulted.

use crate::error::DecodeError;
use bridgewatch_types::{address::COMPRESSED_PUBLIC_KEY_SIZE, HomeAddress};
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Transaction, H256, U256};
use ethers::utils::{public_key_to_address, secret_key_to_address};
use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};
use std::str::FromStr;

const WIF_VERSION: u8 = 0x80;
const WIF_COMPRESSED_FLAG: u8 = 0x01;

fn transaction_type(tx: &Transaction) -> u64 {
    tx.transaction_type.map(|t| t.as_u64()).unwrap_or(0)
}

/// Legacy `v` is 27/28, or `35 + 2 * chain_id + parity` under EIP-155.
/// Typed transactions carry the bare parity.
fn recovery_id(tx: &Transaction) -> Result<RecoveryId, DecodeError> {
    let v = tx.v.as_u64();
    let parity = match (transaction_type(tx), v) {
        (_, 0 | 1) => v,
        (_, 27 | 28) => v - 27,
        (0, v) if v >= 35 => (v - 35) % 2,
        _ => return Err(DecodeError::InvalidSignature(format!("bad recovery id {}", v))),
    };

    RecoveryId::from_byte(parity as u8)
        .ok_or_else(|| DecodeError::InvalidSignature(format!("bad recovery id {}", v)))
}

/// Keccak of the unsigned payload the sender signed.
pub fn signing_hash(tx: &Transaction) -> Result<H256, DecodeError> {
    let mut unsigned = tx.clone();
    match transaction_type(tx) {
        0 => {
            // Nodes do not always fill chainId for legacy txs; the replay
            // protection domain lives in `v`.
            let v = tx.v.as_u64();
            unsigned.chain_id = if v >= 35 { Some(U256::from((v - 35) / 2)) } else { None };
        }
        1 | 2 => {
            if tx.chain_id.is_none() {
                return Err(DecodeError::InvalidSignature("typed tx without chainId".to_string()));
            }
        }
        other => return Err(DecodeError::UnsupportedTransactionType(other)),
    }

    Ok(<TypedTransaction as From<&Transaction>>::from(&unsigned).sighash())
}

pub fn recover_signer(tx: &Transaction) -> Result<VerifyingKey, DecodeError> {
    let message_hash = signing_hash(tx)?;
    let recovery_id = recovery_id(tx)?;

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    tx.r.to_big_endian(&mut r);
    tx.s.to_big_endian(&mut s);

    let signature = Signature::from_scalars(k256::FieldBytes::from(r), k256::FieldBytes::from(s))
        .map_err(|e| DecodeError::InvalidSignature(e.to_string()))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &signature, recovery_id)
        .map_err(|_| DecodeError::RecoveryFailed)
}

/// The sender's home-chain address, derived from the recovered public key.
pub fn interop_address(tx: &Transaction) -> Result<HomeAddress, DecodeError> {
    let key = recover_signer(tx)?;
    Ok(home_address(&key))
}

pub fn home_address(key: &VerifyingKey) -> HomeAddress {
    let encoded = PublicKey::from(key).to_encoded_point(true);
    let mut compressed = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
    compressed.copy_from_slice(encoded.as_bytes());
    HomeAddress::from_compressed_key(&compressed)
}

/// Lowercase, `0x`-prefixed, 20 bytes. Every textual address the watcher
/// emits goes through here.
pub fn format_address(address: &Address) -> String {
    format!("{:#x}", address)
}

pub fn eth_address(key: &VerifyingKey) -> String {
    format_address(&public_key_to_address(key))
}

pub fn parse_address(address: &str) -> Result<Address, DecodeError> {
    let digits = address.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.len() != 40 {
        return Err(DecodeError::InvalidAddress(address.to_string()));
    }
    Address::from_str(digits).map_err(|_| DecodeError::InvalidAddress(address.to_string()))
}

/// Accepts a WIF string or a 64-character hex secret.
pub fn signing_key_from_credential(credential: &str) -> Result<SigningKey, DecodeError> {
    let credential = credential.trim();
    let hex_digits = credential.trim_start_matches("0x");

    let secret = if hex_digits.len() == 64 && hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(hex_digits).map_err(|e| DecodeError::InvalidCredential(e.to_string()))?
    } else {
        let decoded = bs58::decode(credential)
            .with_check(None)
            .into_vec()
            .map_err(|e| DecodeError::InvalidCredential(e.to_string()))?;

        match decoded.as_slice() {
            [WIF_VERSION, secret @ ..] if secret.len() == 32 => secret.to_vec(),
            [WIF_VERSION, secret @ .., WIF_COMPRESSED_FLAG] if secret.len() == 32 => secret.to_vec(),
            _ => return Err(DecodeError::InvalidCredential("malformed WIF payload".to_string())),
        }
    };

    SigningKey::from_slice(&secret).map_err(|e| DecodeError::InvalidCredential(e.to_string()))
}

pub fn derive_eth_address(credential: &str) -> Result<String, DecodeError> {
    let key = signing_key_from_credential(credential)?;
    Ok(format_address(&secret_key_to_address(&key)))
}
