//! Node state
//!
//! The pending pool and the lock-protected state shared by the miner, the
//! network tasks and the console.

pub mod memory_pool;
pub mod shared_state;

pub use memory_pool::MemoryPool;
pub use shared_state::{MiningWork, NodeState, SharedState};
