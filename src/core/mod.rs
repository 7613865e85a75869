//! Consensus engine
//!
//! Blocks and pending records, the two-track proof-of-work puzzle, the
//! difficulty recurrence, the chain store and the merge applied to peer
//! snapshots. Everything here is deterministic except mining itself.

pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod miner;
pub mod proof_of_work;
pub mod sync;
pub mod utxo;

pub use block::{Block, Txos};
pub use blockchain::Blockchain;
pub use difficulty::{Difficulties, DifficultyAdjustment};
pub use miner::Miner;
pub use proof_of_work::{
    find_best_solution, has_valid_solution, leading_zero_bits, meets_difficulty, ProofOfWork,
};
pub use sync::{merge_snapshot, parse_snapshot, MergeOutcome, Snapshot, SyncPolicy};
pub use utxo::Utxo;
