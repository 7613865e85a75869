use crate::core::{Block, Txos, Utxo};
use crate::error::Result;
use log::{debug, warn};

/// Pending records not yet carried by any block. ( K -> record id, V => Utxo )
///
/// The pool holds no lock of its own; it lives inside the node state and is
/// only touched under that state's lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPool {
    inner: Txos,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool { inner: Txos::new() }
    }

    pub fn from_records(records: Txos) -> MemoryPool {
        MemoryPool { inner: records }
    }

    pub fn get(&self, id: &str) -> Option<&Utxo> {
        self.inner.get(id)
    }

    /// Insert `record` under its own id, replacing any entry with that id
    pub fn add(&mut self, record: Utxo) {
        self.inner.insert(record.get_id().to_string(), record);
    }

    /// Admit a locally created record if no block carries its id yet
    pub fn submit(&mut self, record: Utxo, chain: &[Block]) -> Result<()> {
        record.check_unspent(chain)?;
        debug!("Pending record {} -> {}", record.get_id(), record.get_to());
        self.add(record);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Utxo> {
        self.inner.remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get_all(&self) -> &Txos {
        &self.inner
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Merge peer entries into the pool. Peer entries overwrite local ones
    /// stored under the same key.
    pub fn union(&mut self, peer: Txos) {
        self.inner.extend(peer);
    }

    /// Drop every entry stored under a key other than its own id and every
    /// entry whose id is already carried by a block. Returns how many
    /// entries were dropped. Filtering twice changes nothing the second time.
    pub fn filter(&mut self, chain: &[Block]) -> usize {
        let before = self.inner.len();
        self.inner.retain(|key, record| {
            if key != record.get_id() {
                warn!("Dropping pending record stored under mismatched key {key}");
                return false;
            }
            record.is_valid(chain)
        });
        let dropped = before - self.inner.len();
        if dropped > 0 {
            debug!("Filtered {dropped} pending records");
        }
        dropped
    }

    /// Filter, then select up to `limit + 1` entries in key order for the next
    /// block. Selected entries stay pooled until a block carrying them lands.
    pub fn take_batch(&mut self, chain: &[Block], limit: usize) -> Txos {
        self.filter(chain);
        self.inner
            .iter()
            .take(limit.saturating_add(1))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockchainError;

    fn record(to: &str, ts: &str) -> Utxo {
        Utxo::with_timestamp("alice", to, ts)
    }

    fn chain_carrying(records: &[Utxo]) -> Vec<Block> {
        let mut txos = Txos::new();
        for r in records {
            txos.insert(r.get_id().to_string(), r.clone());
        }
        vec![
            Block::genesis("g", 1),
            Block::new_test_block(1, 2, false).with_txos(txos),
        ]
    }

    #[test]
    fn test_memory_pool_operations() {
        let mut pool = MemoryPool::new();
        assert!(pool.is_empty());

        let r = record("bob", "1");
        pool.add(r.clone());
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(r.get_id()));
        assert_eq!(pool.get(r.get_id()), Some(&r));

        assert_eq!(pool.remove(r.get_id()), Some(r));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_submit_rejects_spent_record() {
        let spent = record("bob", "1");
        let chain = chain_carrying(&[spent.clone()]);
        let mut pool = MemoryPool::new();

        assert_eq!(
            pool.submit(spent.clone(), &chain),
            Err(BlockchainError::DuplicateRecord(spent.get_id().to_string()))
        );
        assert!(pool.is_empty());

        pool.submit(record("carol", "2"), &chain).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_filter_drops_spent_and_mismatched() {
        let spent = record("bob", "1");
        let fresh = record("carol", "2");
        let chain = chain_carrying(&[spent.clone()]);

        let mut txos = Txos::new();
        txos.insert(spent.get_id().to_string(), spent);
        txos.insert(fresh.get_id().to_string(), fresh.clone());
        txos.insert("not-the-id".to_string(), record("dave", "3"));
        let mut pool = MemoryPool::from_records(txos);

        assert_eq!(pool.filter(&chain), 2);
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(fresh.get_id()));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let spent = record("bob", "1");
        let chain = chain_carrying(&[spent.clone()]);
        let mut pool = MemoryPool::new();
        pool.add(spent);
        pool.add(record("carol", "2"));
        pool.add(record("dave", "3"));

        pool.filter(&chain);
        let once = pool.clone();
        assert_eq!(pool.filter(&chain), 0);
        assert_eq!(pool, once);
    }

    #[test]
    fn test_union_overwrites_local_entries() {
        let mut pool = MemoryPool::new();
        let local = record("bob", "1");
        pool.add(local.clone());

        // Same key, different content: the peer's copy wins.
        let mut peer = Txos::new();
        peer.insert(local.get_id().to_string(), record("mallory", "9"));
        pool.union(peer);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(local.get_id()).unwrap().get_to(), "mallory");
    }

    #[test]
    fn test_take_batch_limit_plus_one() {
        let chain = vec![Block::genesis("g", 1)];
        let mut pool = MemoryPool::new();
        for i in 0..5 {
            pool.add(record("bob", &i.to_string()));
        }

        let batch = pool.take_batch(&chain, 2);
        assert_eq!(batch.len(), 3);
        assert_eq!(pool.len(), 5);
        let expected: Vec<&String> = pool.get_all().keys().take(3).collect();
        assert_eq!(batch.keys().collect::<Vec<_>>(), expected);

        assert_eq!(pool.take_batch(&chain, 10).len(), 5);
    }
}
