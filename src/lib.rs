//! # pow-ledger
//!
//! A small peer-to-peer ledger. Nodes mine blocks under a two-track
//! proof-of-work puzzle, gossip their whole chain and pending pool to peers
//! as newline-delimited JSON, and adopt the longest chain they observe.
//!
//! ## Layout
//! - `core/`: blocks, pending records, the puzzle, the difficulty recurrence,
//!   the chain store, snapshot merging and the mining task
//! - `storage/`: the pending pool and the lock-protected node state
//! - `network/`: the TCP gossip server and connection bookkeeping
//! - `config/`: layered node configuration
//! - `cli/`: command-line parsing and the operator console
//! - `utils/`: hashing, wire helpers and the shutdown token
//!
//! ## Consensus in one paragraph
//! Every block stores the two difficulties in effect when it was mined. A
//! validator recomputes both from the chain prefix before the block and
//! rejects any mismatch, so the recurrence in `core::difficulty` must give
//! identical results on every node. A block whose solution candidate beats
//! the best one in its prefix only has to meet the lower `pows` difficulty.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;

pub use cli::{Command, Console, Opt};
pub use config::Config;
pub use core::{
    merge_snapshot, parse_snapshot, Block, Blockchain, Difficulties, DifficultyAdjustment,
    MergeOutcome, Miner, ProofOfWork, Snapshot, SyncPolicy, Txos, Utxo,
};
pub use error::{BlockchainError, Result};
pub use network::{PeerManager, Server};
pub use storage::{MemoryPool, NodeState, SharedState};
pub use utils::{current_timestamp, sha256_digest, Shutdown};
