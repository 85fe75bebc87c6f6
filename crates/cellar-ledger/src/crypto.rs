use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};

use crate::types::{Address, Digest};

type Blake2b256 = Blake2b<U32>;

/// Domain separator prepended to transaction data when computing its digest
const TRANSACTION_DATA_SALT: &[u8] = b"TransactionData::";

/// Intent for a transaction data signature: scope = transaction data, version = 0, app = ledger
pub const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Signature scheme flag of ed25519 keys
pub const ED25519_FLAG: u8 = 0x00;

pub fn blake2b256(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }

    hasher.finalize().into()
}

/// Digest identifying a transaction, computed from its serialized data
pub fn transaction_digest(transaction_bytes: &[u8]) -> Digest {
    Digest::new(blake2b256(&[TRANSACTION_DATA_SALT, transaction_bytes]))
}

/// Message actually signed by every party of a transaction
pub fn signing_message(transaction_bytes: &[u8]) -> [u8; 32] {
    blake2b256(&[&TRANSACTION_INTENT[..], transaction_bytes])
}

/// Address controlled by an ed25519 public key
pub fn ed25519_address(public_key: &[u8; 32]) -> Address {
    Address::new(blake2b256(&[&[ED25519_FLAG][..], &public_key[..]]))
}
