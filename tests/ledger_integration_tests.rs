//! Ledger integration tests
//!
//! End-to-end behaviour through the public API: mining and validating
//! chains, difficulty retargeting, double-inclusion defence, longest-chain
//! merging and snapshot gossip between two live nodes.

use pow_ledger::core::difficulty::{
    BLOCKS_PER_DIFFICULTY_UPDATE, GENESIS_POWS_DIFFICULTY, GENESIS_POW_DIFFICULTY,
    MAX_DIFFICULTY_CHANGE,
};
use pow_ledger::core::meets_difficulty;
use pow_ledger::utils::encode_frame;
use pow_ledger::{
    merge_snapshot, parse_snapshot, Block, Blockchain, BlockchainError, Config, DifficultyAdjustment,
    MemoryPool, ProofOfWork, Server, SharedState, Shutdown, Snapshot, SyncPolicy, Txos, Utxo,
};
use std::io::Write;
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn pow() -> ProofOfWork {
    ProofOfWork::new(Duration::ZERO)
}

fn mine_onto(chain: &mut Blockchain, signature: &str, txos: Txos) -> Block {
    let block = pow()
        .generate_block(chain.get_blocks(), signature, txos, || false)
        .unwrap()
        .unwrap();
    chain.append_block(block.clone()).unwrap();
    block
}

fn records(items: &[Utxo]) -> Txos {
    items
        .iter()
        .map(|r| (r.get_id().to_string(), r.clone()))
        .collect()
}

#[test]
fn test_genesis_block() {
    let chain = Blockchain::create_blockchain("node-a").unwrap();
    let genesis = chain.get_genesis();

    assert_eq!(genesis.get_index(), 0);
    assert!(genesis.get_prev_hash().is_empty());
    assert_eq!(genesis.get_hash(), genesis.content_hash().as_slice());
    assert_eq!(genesis.get_pow_difficulty(), GENESIS_POW_DIFFICULTY);
    assert_eq!(genesis.get_pows_difficulty(), GENESIS_POWS_DIFFICULTY);
    chain.is_valid().unwrap();
}

#[test]
fn test_seventeen_blocks_stay_within_max_change() {
    let mut chain = Blockchain::with_genesis(Block::genesis("genesis", 1));
    while chain.len() <= BLOCKS_PER_DIFFICULTY_UPDATE + 1 {
        mine_onto(&mut chain, "miner", Txos::new());
    }

    let block = chain.get_block(BLOCKS_PER_DIFFICULTY_UPDATE + 1).unwrap();
    let drift = (block.get_pow_difficulty() - GENESIS_POW_DIFFICULTY).abs();
    assert!(drift <= MAX_DIFFICULTY_CHANGE as i64);
    assert!(block.get_pows_difficulty() >= 1);

    // Every block meets the track it claims, and the stored difficulties
    // agree with a fresh recomputation.
    for (i, block) in chain.get_blocks().iter().enumerate().skip(1) {
        let expected = DifficultyAdjustment::get_difficulties(chain.get_blocks(), i).unwrap();
        assert_eq!(block.get_difficulties(), expected);
        assert!(meets_difficulty(
            block.get_hash(),
            expected.required(block.is_solution_block())
        ));
    }
    chain.is_valid().unwrap();
}

#[test]
fn test_divergent_chains_merge_both_ways() {
    let genesis = Block::genesis("genesis", 1);

    let mut longer = Blockchain::with_genesis(genesis.clone());
    for _ in 0..3 {
        mine_onto(&mut longer, "node-a", Txos::new());
    }
    let mut shorter = Blockchain::with_genesis(genesis);
    for _ in 0..2 {
        mine_onto(&mut shorter, "node-b", Txos::new());
    }

    // Merging the shorter chain into the longer node changes nothing.
    let mut node = longer.clone();
    let mut pool = MemoryPool::new();
    let outcome = merge_snapshot(
        &mut node,
        &mut pool,
        Snapshot::new(shorter.get_blocks().to_vec(), Txos::new()),
        SyncPolicy::Permissive,
    )
    .unwrap();
    assert!(!outcome.chain_replaced);
    assert_eq!(node, longer);

    // Merging the longer chain into the shorter node adopts it exactly.
    let mut node = shorter.clone();
    let outcome = merge_snapshot(
        &mut node,
        &mut pool,
        Snapshot::new(longer.get_blocks().to_vec(), Txos::new()),
        SyncPolicy::Strict,
    )
    .unwrap();
    assert!(outcome.chain_replaced);
    assert_eq!(node, longer);
}

#[test]
fn test_equal_length_chains_keep_local() {
    let genesis = Block::genesis("genesis", 1);
    let mut local = Blockchain::with_genesis(genesis.clone());
    let mut peer = Blockchain::with_genesis(genesis);
    mine_onto(&mut local, "local", Txos::new());
    mine_onto(&mut peer, "peer", Txos::new());

    let before = local.clone();
    let mut pool = MemoryPool::new();
    merge_snapshot(
        &mut local,
        &mut pool,
        Snapshot::new(peer.get_blocks().to_vec(), Txos::new()),
        SyncPolicy::Permissive,
    )
    .unwrap();
    assert_eq!(local, before);
}

#[test]
fn test_record_cannot_be_included_twice() {
    let mut chain = Blockchain::with_genesis(Block::genesis("genesis", 1));
    let record = Utxo::new("alice", "bob").unwrap();
    assert!(record.is_valid(chain.get_blocks()));

    mine_onto(&mut chain, "miner", records(&[record.clone()]));
    assert!(!record.is_valid(chain.get_blocks()));
    assert!(chain.contains_record(record.get_id()));

    // Still excluded after the chain grows further.
    mine_onto(&mut chain, "miner", Txos::new());
    let mut pool = MemoryPool::new();
    assert_eq!(
        pool.submit(record.clone(), chain.get_blocks()),
        Err(BlockchainError::DuplicateRecord(record.get_id().to_string()))
    );

    // A peer re-gossiping the spent record does not bring it back.
    let outcome = merge_snapshot(
        &mut chain,
        &mut pool,
        Snapshot::new(Vec::new(), records(&[record])),
        SyncPolicy::Permissive,
    )
    .unwrap();
    assert_eq!(outcome.pool_len, 0);
}

#[test]
fn test_filter_is_idempotent_after_merge() {
    let mut chain = Blockchain::with_genesis(Block::genesis("genesis", 1));
    let spent = Utxo::with_timestamp("alice", "bob", "1");
    mine_onto(&mut chain, "miner", records(&[spent.clone()]));

    let mut txos = records(&[
        spent,
        Utxo::with_timestamp("alice", "carol", "2"),
        Utxo::with_timestamp("alice", "dave", "3"),
    ]);
    txos.insert("wrong-key".to_string(), Utxo::with_timestamp("x", "y", "4"));

    let mut pool = MemoryPool::from_records(txos);
    pool.filter(chain.get_blocks());
    let once = pool.clone();
    pool.filter(chain.get_blocks());
    assert_eq!(pool, once);
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_tampered_chain_fails_validation() {
    let mut chain = Blockchain::with_genesis(Block::genesis("genesis", 1));
    for _ in 0..3 {
        mine_onto(&mut chain, "miner", Txos::new());
    }

    // Rewriting a signature breaks the content hash of that block.
    let mut value = serde_json::to_value(chain.get_blocks()).unwrap();
    value[2]["Signature"] = serde_json::Value::from("forger");
    let forged: Vec<Block> = serde_json::from_value(value).unwrap();
    let forged = Blockchain::from_blocks(forged).unwrap();

    match forged.is_valid() {
        Err(BlockchainError::InvalidChain { index, .. }) => assert_eq!(index, 2),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_snapshot_file_round_trip() {
    let mut chain = Blockchain::with_genesis(Block::genesis("genesis", 1));
    mine_onto(&mut chain, "miner", Txos::new());
    let pending = records(&[Utxo::with_timestamp("alice", "bob", "7")]);
    let snapshot = Snapshot::new(chain.get_blocks().to_vec(), pending);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&encode_frame(&snapshot).unwrap()).unwrap();

    let bytes = std::fs::read(file.path()).unwrap();
    let parsed = parse_snapshot(&bytes).unwrap();
    assert_eq!(parsed, snapshot);
    Blockchain::from_blocks(parsed.get_blockchain().to_vec())
        .unwrap()
        .is_valid()
        .unwrap();
}

#[test]
fn test_two_nodes_converge_over_tcp() {
    let mut config = Config::default();
    config.sync.broadcast_interval_ms = 50;
    config.sync.strict = true;

    let genesis = Block::genesis("genesis", 1);

    // Node A holds a longer chain and a pending record.
    let mut chain_a = Blockchain::with_genesis(genesis.clone());
    for _ in 0..3 {
        mine_onto(&mut chain_a, "node-a", Txos::new());
    }
    let state_a = SharedState::new(chain_a.clone());
    let record = Utxo::with_timestamp("node-a", "bob", "42");
    state_a.submit_record(record.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr_a = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_a = Server::new(state_a.clone(), &config, shutdown.clone());
    let handle_a = thread::spawn(move || server_a.run_with_listener(listener));

    // Node B starts from genesis only and dials A.
    let state_b = SharedState::new(Blockchain::with_genesis(genesis));
    let mut config_b = config.clone();
    config_b.node.peers = vec![addr_a.to_string()];
    let listener_b = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_b = Server::new(state_b.clone(), &config_b, shutdown.clone());
    let handle_b = thread::spawn(move || server_b.run_with_listener(listener_b));

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        {
            let guard = state_b.lock().unwrap();
            if guard.chain.len() == chain_a.len() && guard.pool.contains(record.get_id()) {
                assert_eq!(guard.chain, chain_a);
                break;
            }
        }
        assert!(Instant::now() < deadline, "node B did not converge");
        thread::sleep(Duration::from_millis(20));
    }

    // A still holds its own longer chain.
    assert_eq!(state_a.get_chain_len().unwrap(), chain_a.len());

    shutdown.trigger();
    handle_a.join().unwrap().unwrap();
    handle_b.join().unwrap().unwrap();
}
