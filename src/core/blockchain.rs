// The chain store: an ordered, append-only sequence of accepted blocks.
// It only changes by appending a validated successor of the tip or by being
// replaced wholesale with a longer chain.

use crate::core::proof_of_work::find_best_solution;
use crate::core::{Block, DifficultyAdjustment, Difficulties, ProofOfWork};
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// Start a fresh chain whose genesis is signed by `signature` and stamped now
    pub fn create_blockchain(signature: &str) -> Result<Blockchain> {
        let genesis = Block::genesis(signature, current_timestamp()?);
        info!("Created genesis block {}", genesis.get_hash_hex());
        Ok(Self::with_genesis(genesis))
    }

    pub fn with_genesis(genesis: Block) -> Blockchain {
        Blockchain {
            blocks: vec![genesis],
        }
    }

    /// Wrap a received block sequence without validating it
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Blockchain> {
        if blocks.is_empty() {
            return Err(BlockchainError::StructuralMismatch(
                "A chain needs at least a genesis block".to_string(),
            ));
        }
        Ok(Blockchain { blocks })
    }

    pub fn get_blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get_tip(&self) -> &Block {
        // The constructors never produce an empty chain.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get_genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_best_height(&self) -> u64 {
        self.get_tip().get_index()
    }

    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Best-known solution: the lowest candidate in the whole chain
    pub fn get_best_solution(&self) -> i64 {
        find_best_solution(&self.blocks, self.blocks.len())
    }

    /// Difficulties the next mined block has to carry
    pub fn next_difficulties(&self) -> Result<Difficulties> {
        DifficultyAdjustment::get_difficulties(&self.blocks, self.blocks.len())
    }

    /// Whether any accepted block carries record `id`, scanning newest first
    pub fn contains_record(&self, id: &str) -> bool {
        self.blocks
            .iter()
            .rev()
            .any(|block| block.get_txos().contains_key(id))
    }

    /// Append `block` if it validates against the current tip
    pub fn append_block(&mut self, block: Block) -> Result<()> {
        ProofOfWork::validate_block(&self.blocks, &block, self.get_tip())?;
        info!(
            "Appended block {} ({}) with {} records",
            block.get_index(),
            block.get_hash_hex(),
            block.get_txos().len()
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Replace the whole chain. Callers decide whether `other` was validated.
    pub fn replace_with(&mut self, other: Blockchain) {
        self.blocks = other.blocks;
    }

    pub fn is_valid(&self) -> Result<()> {
        ProofOfWork::validate_chain(&self.blocks)
    }
}
