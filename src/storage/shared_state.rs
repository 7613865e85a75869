use crate::core::{
    merge_snapshot, Block, Blockchain, MergeOutcome, Snapshot, SyncPolicy, Txos, Utxo,
};
use crate::error::{BlockchainError, Result};
use crate::storage::MemoryPool;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything a node mutates: the chain, the pending pool and the last
/// snapshot handed to the broadcasters
#[derive(Debug)]
pub struct NodeState {
    pub chain: Blockchain,
    pub pool: MemoryPool,
    pub last_snapshot: Option<Snapshot>,
}

impl NodeState {
    pub fn new(chain: Blockchain) -> NodeState {
        NodeState {
            chain,
            pool: MemoryPool::new(),
            last_snapshot: None,
        }
    }
}

/// Cloneable handle to the node state. A single mutex guards chain and pool
/// together; the generation counter moves on every append or replacement so
/// the miner can notice a stale tip without taking the lock.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<NodeState>>,
    generation: Arc<AtomicU64>,
}

/// What the miner needs to build its next block
#[derive(Debug, Clone)]
pub struct MiningWork {
    pub blocks: Vec<Block>,
    pub batch: Txos,
    pub generation: u64,
}

impl SharedState {
    pub fn new(chain: Blockchain) -> SharedState {
        SharedState {
            inner: Arc::new(Mutex::new(NodeState::new(chain))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, NodeState>> {
        self.inner
            .lock()
            .map_err(|e| BlockchainError::State(format!("Failed to acquire state lock: {e}")))
    }

    pub fn get_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Filter the pool, take the next batch and copy the chain, all under one lock
    pub fn mining_work(&self, batch_limit: usize) -> Result<MiningWork> {
        let mut state = self.lock()?;
        let NodeState { chain, pool, .. } = &mut *state;
        let batch = pool.take_batch(chain.get_blocks(), batch_limit);
        Ok(MiningWork {
            blocks: chain.get_blocks().to_vec(),
            batch,
            generation: self.get_generation(),
        })
    }

    /// Validate `block` against the current tip and append it in the same
    /// critical section, then drop the records it carried from the pool
    pub fn append_block(&self, block: Block) -> Result<()> {
        let mut state = self.lock()?;
        let NodeState { chain, pool, .. } = &mut *state;
        chain.append_block(block)?;
        pool.filter(chain.get_blocks());
        self.bump_generation();
        Ok(())
    }

    pub fn merge_snapshot(&self, snapshot: Snapshot, policy: SyncPolicy) -> Result<MergeOutcome> {
        let mut state = self.lock()?;
        let NodeState { chain, pool, .. } = &mut *state;
        let outcome = merge_snapshot(chain, pool, snapshot, policy)?;
        if outcome.chain_replaced {
            self.bump_generation();
        }
        Ok(outcome)
    }

    /// Filter the pool and capture chain and pool as the next broadcast
    pub fn broadcast_snapshot(&self) -> Result<Snapshot> {
        let mut state = self.lock()?;
        let NodeState {
            chain,
            pool,
            last_snapshot,
        } = &mut *state;
        pool.filter(chain.get_blocks());
        let snapshot = Snapshot::new(chain.get_blocks().to_vec(), pool.get_all().clone());
        *last_snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Pool `record` if no block carries its id yet; returns the id
    pub fn submit_record(&self, record: Utxo) -> Result<String> {
        let mut state = self.lock()?;
        let NodeState { chain, pool, .. } = &mut *state;
        let id = record.get_id().to_string();
        pool.submit(record, chain.get_blocks())?;
        info!("Record {id} added to the pending pool");
        Ok(id)
    }

    pub fn get_chain_len(&self) -> Result<usize> {
        Ok(self.lock()?.chain.len())
    }
}
