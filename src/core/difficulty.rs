use crate::core::Block;
use crate::error::{BlockchainError, Result};
use log::debug;

// Difficulty recurrence constants. These are consensus rules: every node must
// use the same values or chains stop validating across nodes.
pub const GENESIS_POW_DIFFICULTY: i64 = 8; // Classic track, leading zero bits
pub const GENESIS_POWS_DIFFICULTY: i64 = 4; // Solution track, leading zero bits
pub const BLOCKS_PER_DIFFICULTY_UPDATE: usize = 16;
pub const ETA: f64 = 0.5; // Target solution/classic production pace
pub const MAX_DIFFICULTY_CHANGE: f64 = 2.0;
const MIN_DIFFICULTY: f64 = 1.0;

/// The two difficulty levels in effect for one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulties {
    pub pow: i64,
    pub pows: i64,
}

impl Difficulties {
    pub fn genesis() -> Self {
        Difficulties {
            pow: GENESIS_POW_DIFFICULTY,
            pows: GENESIS_POWS_DIFFICULTY,
        }
    }

    /// Difficulty a block must meet given whether it improves the best solution
    pub fn required(&self, is_solution_block: bool) -> i64 {
        if is_solution_block {
            self.pows
        } else {
            self.pow
        }
    }
}

/// Production statistics over blocks `[1, index)` of a chain prefix
#[derive(Debug, Clone, Copy, PartialEq)]
struct PaceStats {
    classic_ratio: f64,
    solution_span: f64,
    classic_span: f64,
}

impl PaceStats {
    fn collect(prefix: &[Block]) -> PaceStats {
        let mut classic_blocks = 0usize;
        let mut solution_span = 0f64;
        let mut classic_span = 0f64;

        for pair in prefix.windows(2) {
            // Peer timestamps are arbitrary i64, so the gap is taken in i128.
            let gap = i128::from(pair[1].get_timestamp()) - i128::from(pair[0].get_timestamp());
            let delta = gap as f64;
            if pair[1].is_solution_block() {
                solution_span += delta;
            } else {
                classic_blocks += 1;
                classic_span += delta;
            }
        }

        let counted = prefix.len().saturating_sub(1);
        let classic_ratio = if counted == 0 {
            1.0
        } else {
            classic_blocks as f64 / counted as f64
        };

        PaceStats {
            classic_ratio,
            solution_span,
            classic_span,
        }
    }

    /// Relative pace of solution vs classic production. Without any classic
    /// time on record the pace is taken to be on target.
    fn eta(&self) -> f64 {
        if self.classic_span == 0.0 {
            ETA
        } else {
            self.solution_span / self.classic_span
        }
    }
}

/// Adaptive two-track difficulty recurrence
pub struct DifficultyAdjustment;

impl DifficultyAdjustment {
    /// Difficulties for the block at `index`, recomputed from `chain[0..index)`.
    pub fn get_difficulties(chain: &[Block], index: usize) -> Result<Difficulties> {
        if index > chain.len() {
            return Err(BlockchainError::StructuralMismatch(format!(
                "Difficulty for index {index} needs {index} prior blocks, chain has {}",
                chain.len()
            )));
        }
        Ok(Self::for_prefix(&chain[..index]))
    }

    /// Pure function of the prefix. Recomputed from genesis on every call so
    /// that every node derives the same values from the same blocks.
    pub fn for_prefix(prefix: &[Block]) -> Difficulties {
        let index = prefix.len();
        if index <= BLOCKS_PER_DIFFICULTY_UPDATE {
            return Difficulties::genesis();
        }

        let mut pow = GENESIS_POW_DIFFICULTY as f64;
        let mut pows = GENESIS_POWS_DIFFICULTY as f64;

        let stats = PaceStats::collect(prefix);
        let eta = stats.eta();
        let ratio = stats.classic_ratio;
        let change = (ratio + (1.0 - ratio) * eta) / (ratio + (1.0 - ratio) * ETA);

        for i in 1..index {
            if i % BLOCKS_PER_DIFFICULTY_UPDATE != 0 {
                continue;
            }
            let base_pow = pow;
            let base_pows = pows;

            pow = (pow * change).round();
            pows = pows + ETA * pow - eta * (pow - change);

            pow = Self::clamp_step(pow, base_pow);
            pows = Self::clamp_step(pows, base_pows);

            debug!(
                "Difficulty update at block {i} of {index}: pow {base_pow} -> {pow}, pows {base_pows} -> {pows} (ratio {ratio:.3}, eta {eta:.3}, change {change:.3})"
            );
        }

        Difficulties {
            pow: pow.round() as i64,
            pows: pows.round() as i64,
        }
    }

    fn clamp_step(value: f64, base: f64) -> f64 {
        let bounded = if value.is_nan() {
            base
        } else {
            value.clamp(base - MAX_DIFFICULTY_CHANGE, base + MAX_DIFFICULTY_CHANGE)
        };
        bounded.max(MIN_DIFFICULTY)
    }
}
