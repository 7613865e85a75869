// Snapshot exchange between peers and the merge applied on receipt.

use crate::core::{Block, Blockchain, ProofOfWork, Txos};
use crate::error::Result;
use crate::storage::MemoryPool;
use crate::utils::decode_frame;
use crate::utils::serialization::null_as_default;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One gossip message: a node's whole chain plus its pending pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "Blockchain", default, deserialize_with = "null_as_default")]
    blockchain: Vec<Block>,
    #[serde(rename = "UTXOs", default, deserialize_with = "null_as_default")]
    utxos: Txos,
}

impl Snapshot {
    pub fn new(blockchain: Vec<Block>, utxos: Txos) -> Snapshot {
        Snapshot { blockchain, utxos }
    }

    pub fn get_blockchain(&self) -> &[Block] {
        &self.blockchain
    }

    pub fn get_utxos(&self) -> &Txos {
        &self.utxos
    }

    pub fn into_parts(self) -> (Vec<Block>, Txos) {
        (self.blockchain, self.utxos)
    }
}

/// How a longer peer chain is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Adopt any strictly longer chain as received
    #[default]
    Permissive,
    /// Adopt a strictly longer chain only if it validates from genesis
    Strict,
}

impl SyncPolicy {
    pub fn from_strict(strict: bool) -> SyncPolicy {
        if strict {
            SyncPolicy::Strict
        } else {
            SyncPolicy::Permissive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub chain_replaced: bool,
    pub local_len: usize,
    pub peer_len: usize,
    pub pool_len: usize,
}

/// Apply a peer snapshot: longest chain wins, then the peer pool is merged
/// into the local pool and the result is filtered against the final chain.
///
/// Under `SyncPolicy::Strict` an invalid longer chain is refused and the
/// whole snapshot, pool included, is dropped.
pub fn merge_snapshot(
    chain: &mut Blockchain,
    pool: &mut MemoryPool,
    snapshot: Snapshot,
    policy: SyncPolicy,
) -> Result<MergeOutcome> {
    let (peer_blocks, peer_utxos) = snapshot.into_parts();
    let local_len = chain.len();
    let peer_len = peer_blocks.len();

    let mut chain_replaced = false;
    if peer_len > local_len {
        if policy == SyncPolicy::Strict {
            ProofOfWork::validate_chain(&peer_blocks).map_err(|e| {
                warn!("Refusing longer peer chain of {peer_len} blocks: {e}");
                e
            })?;
        }
        chain.replace_with(Blockchain::from_blocks(peer_blocks)?);
        chain_replaced = true;
        info!("Adopted peer chain: {local_len} -> {peer_len} blocks");
    }

    pool.union(peer_utxos);
    pool.filter(chain.get_blocks());

    Ok(MergeOutcome {
        chain_replaced,
        local_len,
        peer_len,
        pool_len: pool.len(),
    })
}

/// Parse a snapshot file or a received frame
pub fn parse_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    decode_frame(bytes)
}
