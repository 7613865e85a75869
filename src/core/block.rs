use crate::core::difficulty::{Difficulties, GENESIS_POWS_DIFFICULTY, GENESIS_POW_DIFFICULTY};
use crate::core::proof_of_work::INITIAL_SOLUTION_CEILING;
use crate::core::Utxo;
use crate::error::{BlockchainError, Result};
use crate::utils::serialization::{base64_bytes, null_as_default};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records carried by a block, keyed by record id
pub type Txos = BTreeMap<String, Utxo>;

/// A block as it travels on the wire. Field names follow the peer JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "Index")]
    index: u64,
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "POW_difficulty")]
    pow_difficulty: i64,
    #[serde(rename = "POWS_difficulty")]
    pows_difficulty: i64,
    #[serde(rename = "Signature")]
    signature: String,
    #[serde(rename = "Hash", with = "base64_bytes")]
    hash: Vec<u8>,
    #[serde(rename = "PrevHash", with = "base64_bytes")]
    prev_hash: Vec<u8>,
    #[serde(rename = "Nonce")]
    nonce: String,
    #[serde(rename = "Txos", default, deserialize_with = "null_as_default")]
    txos: Txos,
    /// Fixed puzzle ceiling, always `INITIAL_SOLUTION_CEILING`
    #[serde(rename = "Problem")]
    solution_target: i64,
    #[serde(rename = "Solution")]
    solution_candidate: i64,
    #[serde(rename = "HasSolution")]
    is_solution_block: bool,
}

impl Block {
    /// Genesis: index 0, empty previous hash, genesis difficulties. Its hash
    /// is the content hash of its own fields; it is not required to solve
    /// the puzzle.
    pub fn genesis(signature: &str, timestamp: i64) -> Block {
        let mut block = Block {
            index: 0,
            timestamp,
            pow_difficulty: GENESIS_POW_DIFFICULTY,
            pows_difficulty: GENESIS_POWS_DIFFICULTY,
            signature: signature.to_string(),
            hash: Vec::new(),
            prev_hash: Vec::new(),
            nonce: String::new(),
            txos: Txos::new(),
            solution_target: INITIAL_SOLUTION_CEILING,
            solution_candidate: INITIAL_SOLUTION_CEILING,
            is_solution_block: false,
        };
        block.hash = block.content_hash();
        block
    }

    /// Unsolved successor of `prev`; the miner fills nonce, candidate and hash.
    /// Fails when `prev` already carries the largest representable index.
    pub(crate) fn new_candidate(
        prev: &Block,
        timestamp: i64,
        difficulties: Difficulties,
        signature: &str,
        txos: Txos,
        best_solution: i64,
    ) -> Result<Block> {
        let index = prev.index.checked_add(1).ok_or_else(|| {
            BlockchainError::StructuralMismatch(format!(
                "Block {} has no successor index",
                prev.index
            ))
        })?;
        Ok(Block {
            index,
            timestamp,
            pow_difficulty: difficulties.pow,
            pows_difficulty: difficulties.pows,
            signature: signature.to_string(),
            hash: Vec::new(),
            prev_hash: prev.hash.clone(),
            nonce: String::new(),
            txos,
            solution_target: INITIAL_SOLUTION_CEILING,
            solution_candidate: best_solution,
            is_solution_block: false,
        })
    }

    /// SHA-256 over index, timestamp, signature, previous hash and nonce, in
    /// that order. Numbers are decimal, the previous hash is lowercase hex.
    pub fn content_hash(&self) -> Vec<u8> {
        sha256_digest(self.preimage().as_bytes())
    }

    fn preimage(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.index,
            self.timestamp,
            self.signature,
            HEXLOWER.encode(&self.prev_hash),
            self.nonce
        )
    }

    pub(crate) fn set_attempt(&mut self, nonce: u64, solution_candidate: i64, is_solution: bool) {
        self.nonce = format!("{nonce:x}");
        self.solution_candidate = solution_candidate;
        self.is_solution_block = is_solution;
    }

    pub(crate) fn seal(&mut self, hash: Vec<u8>) {
        self.hash = hash;
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_pow_difficulty(&self) -> i64 {
        self.pow_difficulty
    }

    pub fn get_pows_difficulty(&self) -> i64 {
        self.pows_difficulty
    }

    pub fn get_difficulties(&self) -> Difficulties {
        Difficulties {
            pow: self.pow_difficulty,
            pows: self.pows_difficulty,
        }
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_txos(&self) -> &Txos {
        &self.txos
    }

    pub fn get_solution_target(&self) -> i64 {
        self.solution_target
    }

    pub fn get_solution_candidate(&self) -> i64 {
        self.solution_candidate
    }

    pub fn is_solution_block(&self) -> bool {
        self.is_solution_block
    }
}

/// Builders for hand-made blocks in tests; nothing here mines or validates.
#[cfg(test)]
impl Block {
    pub(crate) fn new_test_block(index: u64, timestamp: i64, is_solution_block: bool) -> Block {
        Block {
            index,
            timestamp,
            pow_difficulty: GENESIS_POW_DIFFICULTY,
            pows_difficulty: GENESIS_POWS_DIFFICULTY,
            signature: "test".to_string(),
            hash: Vec::new(),
            prev_hash: Vec::new(),
            nonce: String::new(),
            txos: Txos::new(),
            solution_target: INITIAL_SOLUTION_CEILING,
            solution_candidate: INITIAL_SOLUTION_CEILING,
            is_solution_block,
        }
    }

    pub(crate) fn with_txos(mut self, txos: Txos) -> Block {
        self.txos = txos;
        self
    }

    pub(crate) fn with_index(mut self, index: u64) -> Block {
        self.index = index;
        self
    }

    pub(crate) fn with_nonce(mut self, nonce: &str) -> Block {
        self.nonce = nonce.to_string();
        self
    }

    pub(crate) fn with_hash(mut self, hash: Vec<u8>) -> Block {
        self.hash = hash;
        self
    }

    pub(crate) fn with_difficulties(mut self, pow: i64, pows: i64) -> Block {
        self.pow_difficulty = pow;
        self.pows_difficulty = pows;
        self
    }

    pub(crate) fn with_solution_candidate(mut self, candidate: i64) -> Block {
        self.solution_candidate = candidate;
        self
    }

    /// Link to `prev` and seal with the honest content hash
    pub(crate) fn linked_to(mut self, prev: &Block) -> Block {
        self.prev_hash = prev.hash.clone();
        self.hash = self.content_hash();
        self
    }
}
