use crate::core::block::Txos;
use crate::core::{Block, DifficultyAdjustment, Difficulties};
use crate::error::{BlockchainError, DifficultyTrack, Result};
use crate::utils::current_timestamp;
use data_encoding::HEXLOWER;
use log::{debug, info};
use rand::Rng;
use std::thread;
use std::time::Duration;

/// Best-solution seed for an empty prefix, and the genesis candidate
pub const INITIAL_SOLUTION_CEILING: i64 = 10;

/// Leading zero bits of the first four hash bytes read as a big-endian u32.
/// Hashes shorter than four bytes count as zero.
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    match hash.get(..4) {
        Some(head) => u32::from_be_bytes([head[0], head[1], head[2], head[3]]).leading_zeros(),
        None => 0,
    }
}

pub fn meets_difficulty(hash: &[u8], difficulty: i64) -> bool {
    i64::from(leading_zero_bits(hash)) >= difficulty
}

/// Lowest solution candidate in `chain[0..index)`, seeded at the ceiling
pub fn find_best_solution(chain: &[Block], index: usize) -> i64 {
    chain
        .iter()
        .take(index)
        .map(Block::get_solution_candidate)
        .fold(INITIAL_SOLUTION_CEILING, i64::min)
}

pub fn has_valid_solution(candidate: i64, best_solution: i64) -> bool {
    candidate < best_solution
}

/// Mines and validates blocks against a chain prefix
pub struct ProofOfWork {
    mining_interval: Duration,
}

impl ProofOfWork {
    /// `mining_interval` is slept after every failed attempt
    pub fn new(mining_interval: Duration) -> ProofOfWork {
        ProofOfWork { mining_interval }
    }

    /// Mine the successor of `chain`'s tip. Each attempt draws a fresh
    /// solution candidate in `best - 2 ..= best + 1` and hashes with the next
    /// nonce; a candidate below the best solution selects the pows track.
    ///
    /// `should_abort` is polled before every attempt. Returns `Ok(None)` when
    /// it fires, so a stale tip or shutdown interrupts the search.
    pub fn generate_block(
        &self,
        chain: &[Block],
        signature: &str,
        txos: Txos,
        should_abort: impl Fn() -> bool,
    ) -> Result<Option<Block>> {
        let prev = chain.last().ok_or_else(|| {
            BlockchainError::StructuralMismatch("Cannot mine on an empty chain".to_string())
        })?;
        let index = chain.len();
        let difficulties = DifficultyAdjustment::get_difficulties(chain, index)?;
        let best_solution = find_best_solution(chain, index);

        let mut block = Block::new_candidate(
            prev,
            current_timestamp()?,
            difficulties,
            signature,
            txos,
            best_solution,
        )?;

        info!(
            "Mining block {index} (pow {}, pows {}, best solution {best_solution})",
            difficulties.pow, difficulties.pows
        );

        let mut rng = rand::thread_rng();
        let mut nonce: u64 = 0;
        loop {
            if should_abort() {
                debug!("Mining of block {index} interrupted after {nonce} attempts");
                return Ok(None);
            }

            let candidate = best_solution.saturating_add(rng.gen_range(-2..=1));
            let is_solution = has_valid_solution(candidate, best_solution);
            block.set_attempt(nonce, candidate, is_solution);

            let hash = block.content_hash();
            if meets_difficulty(&hash, difficulties.required(is_solution)) {
                info!(
                    "Mined block {index}: {} after {} attempts (solution block: {is_solution})",
                    HEXLOWER.encode(&hash),
                    nonce + 1
                );
                block.seal(hash);
                return Ok(Some(block));
            }

            nonce += 1;
            if !self.mining_interval.is_zero() {
                thread::sleep(self.mining_interval);
            }
        }
    }

    /// Validate `candidate` as the successor of `prev`. `chain` must hold at
    /// least the `candidate.index` blocks preceding it.
    pub fn validate_block(chain: &[Block], candidate: &Block, prev: &Block) -> Result<()> {
        if prev.get_index().checked_add(1) != Some(candidate.get_index()) {
            return Err(BlockchainError::StructuralMismatch(format!(
                "Index {} does not follow {}",
                candidate.get_index(),
                prev.get_index()
            )));
        }

        if candidate.get_prev_hash() != prev.get_hash() {
            return Err(BlockchainError::StructuralMismatch(format!(
                "Block {} links to {} instead of {}",
                candidate.get_index(),
                HEXLOWER.encode(candidate.get_prev_hash()),
                prev.get_hash_hex()
            )));
        }

        let hash = candidate.content_hash();
        if hash != candidate.get_hash() {
            return Err(BlockchainError::StructuralMismatch(format!(
                "Block {} hash {} does not match its content {}",
                candidate.get_index(),
                candidate.get_hash_hex(),
                HEXLOWER.encode(&hash)
            )));
        }

        let index = candidate.get_index() as usize;
        let expected = DifficultyAdjustment::get_difficulties(chain, index)?;
        Self::check_difficulties(expected, candidate.get_difficulties())?;

        let best_solution = find_best_solution(chain, index);
        let is_solution = has_valid_solution(candidate.get_solution_candidate(), best_solution);
        let required = expected.required(is_solution);
        if !meets_difficulty(&hash, required) {
            return Err(BlockchainError::PuzzleUnmet {
                difficulty: required,
                leading_zeros: leading_zero_bits(&hash),
            });
        }

        Ok(())
    }

    fn check_difficulties(expected: Difficulties, actual: Difficulties) -> Result<()> {
        if actual.pows != expected.pows {
            return Err(BlockchainError::DifficultyMismatch {
                track: DifficultyTrack::Pows,
                expected: expected.pows,
                actual: actual.pows,
            });
        }
        if actual.pow != expected.pow {
            return Err(BlockchainError::DifficultyMismatch {
                track: DifficultyTrack::Pow,
                expected: expected.pow,
                actual: actual.pow,
            });
        }
        Ok(())
    }

    /// Validate every adjacent pair from the tip back to genesis, then the
    /// genesis block itself. Reports the index of the first failure found.
    pub fn validate_chain(chain: &[Block]) -> Result<()> {
        let genesis = chain.first().ok_or_else(|| {
            BlockchainError::StructuralMismatch("Chain has no genesis block".to_string())
        })?;

        for i in (1..chain.len()).rev() {
            Self::validate_block(chain, &chain[i], &chain[i - 1]).map_err(|e| {
                BlockchainError::InvalidChain {
                    index: i as u64,
                    source: Box::new(e),
                }
            })?;
        }

        Self::validate_genesis(genesis).map_err(|e| BlockchainError::InvalidChain {
            index: 0,
            source: Box::new(e),
        })
    }

    fn validate_genesis(genesis: &Block) -> Result<()> {
        if genesis.get_index() != 0 || !genesis.get_prev_hash().is_empty() {
            return Err(BlockchainError::StructuralMismatch(
                "Genesis must have index 0 and an empty previous hash".to_string(),
            ));
        }
        if genesis.content_hash() != genesis.get_hash() {
            return Err(BlockchainError::StructuralMismatch(
                "Genesis hash does not match its content".to_string(),
            ));
        }
        Ok(())
    }
}
