// A pending value-transfer record. Records carry no signature and no balance
// proof; the only admission rule is that an id is included at most once.

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, sha256_hex};
use serde::{Deserialize, Serialize};

/// Amount carried by every locally created record
pub const RECORD_AMOUNT: i64 = 4;
/// Fee carried by every locally created record
pub const RECORD_FEE: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "To")]
    to: String,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "PublicKey")]
    public_key: String,
    #[serde(rename = "Fee")]
    fee: i64,
}

impl Utxo {
    /// Build a new record from `from` (the local signer) to `to`, stamped now
    pub fn new(from: &str, to: &str) -> Result<Utxo> {
        let timestamp = current_timestamp()?.to_string();
        Ok(Self::with_timestamp(from, to, &timestamp))
    }

    pub fn with_timestamp(from: &str, to: &str, timestamp: &str) -> Utxo {
        Utxo {
            timestamp: timestamp.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount: RECORD_AMOUNT,
            id: Self::compute_id(from, to, timestamp),
            public_key: from.to_string(),
            fee: RECORD_FEE,
        }
    }

    /// id = sha256(from ∥ to ∥ timestamp), hex encoded
    pub fn compute_id(from: &str, to: &str, timestamp: &str) -> String {
        let mut record = String::with_capacity(from.len() + to.len() + timestamp.len());
        record.push_str(from);
        record.push_str(to);
        record.push_str(timestamp);
        sha256_hex(record.as_bytes())
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_timestamp(&self) -> &str {
        self.timestamp.as_str()
    }

    pub fn get_from(&self) -> &str {
        self.from.as_str()
    }

    pub fn get_to(&self) -> &str {
        self.to.as_str()
    }

    pub fn get_amount(&self) -> i64 {
        self.amount
    }

    pub fn get_fee(&self) -> i64 {
        self.fee
    }

    pub fn get_public_key(&self) -> &str {
        self.public_key.as_str()
    }

    /// Fails with `DuplicateRecord` if any block already carries this id.
    /// Blocks are scanned newest first and the scan stops at the first hit.
    pub fn check_unspent(&self, chain: &[Block]) -> Result<()> {
        if chain
            .iter()
            .rev()
            .any(|block| block.get_txos().contains_key(self.id.as_str()))
        {
            return Err(BlockchainError::DuplicateRecord(self.id.clone()));
        }
        Ok(())
    }

    pub fn is_valid(&self, chain: &[Block]) -> bool {
        self.check_unspent(chain).is_ok()
    }
}
