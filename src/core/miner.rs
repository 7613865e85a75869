use crate::core::ProofOfWork;
use crate::error::Result;
use crate::storage::SharedState;
use crate::utils::Shutdown;
use log::{debug, info, warn};
use std::time::Duration;

/// Long-running mining task. Each round pauses, snapshots the chain and a
/// batch of pending records, mines without holding the lock, then appends
/// through the shared state, which revalidates against the live tip.
pub struct Miner {
    state: SharedState,
    signature: String,
    pow: ProofOfWork,
    pause: Duration,
    batch_limit: usize,
}

impl Miner {
    pub fn new(
        state: SharedState,
        signature: &str,
        mining_interval: Duration,
        pause: Duration,
        batch_limit: usize,
    ) -> Miner {
        Miner {
            state,
            signature: signature.to_string(),
            pow: ProofOfWork::new(mining_interval),
            pause,
            batch_limit,
        }
    }

    /// Mine until `shutdown` fires
    pub fn run(&self, shutdown: &Shutdown) -> Result<()> {
        info!("Miner started as {}", self.signature);
        while shutdown.sleep(self.pause) {
            match self.mine_once(shutdown) {
                Ok(true) => {}
                Ok(false) => debug!("Mining round abandoned"),
                Err(e) => warn!("Mined block was not appended: {e}"),
            }
        }
        info!("Miner stopped");
        Ok(())
    }

    /// One mining round. Returns false when it was interrupted by shutdown or
    /// by another block landing first.
    pub fn mine_once(&self, shutdown: &Shutdown) -> Result<bool> {
        let work = self.state.mining_work(self.batch_limit)?;
        let generation = work.generation;
        let state = &self.state;

        let mined = self.pow.generate_block(&work.blocks, &self.signature, work.batch, || {
            shutdown.is_triggered() || state.get_generation() != generation
        })?;

        match mined {
            Some(block) => {
                self.state.append_block(block)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
