use crate::config::Config;
use crate::core::{Snapshot, SyncPolicy};
use crate::error::{BlockchainError, Result};
use crate::network::PeerManager;
use crate::storage::SharedState;
use crate::utils::{decode_frame, encode_frame, Shutdown};
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{self, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Largest frame a peer may send before its stream is dropped
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
const TCP_WRITE_TIMEOUT: u64 = 5000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Peer gossip server. Every open stream gets a broadcaster thread that
/// sends the whole node snapshot on an interval and a receiver thread that
/// forwards parsed snapshots to a single sync worker.
pub struct Server {
    state: SharedState,
    peer_manager: PeerManager,
    shutdown: Shutdown,
    peers: Vec<String>,
    broadcast_interval: Duration,
    policy: SyncPolicy,
    channel_capacity: usize,
}

/// Everything a connection thread needs, cloned per stream
#[derive(Clone)]
struct ConnectionContext {
    state: SharedState,
    peer_manager: PeerManager,
    shutdown: Shutdown,
    broadcast_interval: Duration,
    snapshots: SyncSender<Snapshot>,
}

impl Server {
    pub fn new(state: SharedState, config: &Config, shutdown: Shutdown) -> Self {
        Self {
            state,
            peer_manager: PeerManager::new(config.node.max_connections),
            shutdown,
            peers: config.node.peers.clone(),
            broadcast_interval: config.sync.broadcast_interval(),
            policy: SyncPolicy::from_strict(config.sync.strict),
            channel_capacity: config.sync.channel_capacity.max(1),
        }
    }

    /// Bind the configured listen address
    pub fn bind(config: &Config) -> Result<TcpListener> {
        let addr = &config.node.listen_addr;
        TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))
    }

    /// Serve on an already bound listener until shutdown
    pub fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| BlockchainError::Network(format!("Failed to configure listener: {e}")))?;
        info!("Server listening on {local_addr}");

        let (sender, receiver) = mpsc::sync_channel(self.channel_capacity);
        let worker = self.spawn_sync_worker(receiver);
        let context = ConnectionContext {
            state: self.state.clone(),
            peer_manager: self.peer_manager.clone(),
            shutdown: self.shutdown.clone(),
            broadcast_interval: self.broadcast_interval,
            snapshots: sender,
        };

        for peer in &self.peers {
            match TcpStream::connect(peer) {
                Ok(stream) => Self::spawn_connection(&context, stream),
                Err(e) => warn!("Failed to connect to peer {peer}: {e}"),
            }
        }

        while !self.shutdown.is_triggered() {
            match listener.accept() {
                Ok((stream, peer_addr)) => {
                    if !self
                        .peer_manager
                        .should_accept_connection()
                        .unwrap_or(false)
                    {
                        warn!("Rejecting connection from {peer_addr}: connection limit reached");
                        continue;
                    }
                    Self::spawn_connection(&context, stream);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }

        drop(context);
        if worker.join().is_err() {
            error!("Sync worker panicked");
        }
        info!("Server on {local_addr} stopped");
        Ok(())
    }

    /// The only consumer of received snapshots; merges them one at a time
    fn spawn_sync_worker(&self, receiver: Receiver<Snapshot>) -> JoinHandle<()> {
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let policy = self.policy;
        thread::spawn(move || loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(snapshot) => match state.merge_snapshot(snapshot, policy) {
                    Ok(outcome) => debug!(
                        "Merged snapshot: peer {} blocks, local {} blocks, replaced {}, pool {}",
                        outcome.peer_len, outcome.local_len, outcome.chain_replaced, outcome.pool_len
                    ),
                    Err(e) => warn!("Rejected peer snapshot: {e}"),
                },
                Err(RecvTimeoutError::Timeout) => {
                    if shutdown.is_triggered() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
    }

    fn spawn_connection(context: &ConnectionContext, stream: TcpStream) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get peer address: {e}");
                return;
            }
        };

        // Accepted streams may inherit the listener's non-blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            error!("Failed to configure stream for {peer_addr}: {e}");
            return;
        }

        if let Err(e) = context.peer_manager.record_connection(peer_addr) {
            warn!("Dropping stream from {peer_addr}: {e}");
            return;
        }

        let write_half = match stream.try_clone() {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to clone stream for {peer_addr}: {e}");
                let _ = context.peer_manager.record_disconnection(peer_addr);
                return;
            }
        };

        let broadcaster = context.clone();
        thread::spawn(move || {
            if let Err(e) = Self::broadcast_loop(&broadcaster, write_half, peer_addr) {
                warn!("Broadcaster for {peer_addr} stopped: {e}");
            }
        });

        let receiver = context.clone();
        thread::spawn(move || {
            let result = Self::receive_loop(&receiver, &stream, peer_addr);
            let _ = stream.shutdown(net::Shutdown::Both);

            if let Err(e) = receiver.peer_manager.record_disconnection(peer_addr) {
                warn!("Failed to record disconnection: {e}");
            }
            if let Err(e) = result {
                warn!("Receiver for {peer_addr} stopped: {e}");
            }
        });
    }

    /// Send the current snapshot immediately, then once per interval
    fn broadcast_loop(
        context: &ConnectionContext,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

        loop {
            let snapshot = context.state.broadcast_snapshot()?;
            let frame = encode_frame(&snapshot)?;
            if let Err(e) = stream.write_all(&frame).and_then(|_| stream.flush()) {
                let _ = stream.shutdown(net::Shutdown::Both);
                return Err(BlockchainError::Network(format!(
                    "Failed to send snapshot to {peer_addr}: {e}"
                )));
            }
            debug!(
                "Sent {} blocks and {} records to {peer_addr}",
                snapshot.get_blockchain().len(),
                snapshot.get_utxos().len()
            );

            if !context.shutdown.sleep(context.broadcast_interval) {
                let _ = stream.shutdown(net::Shutdown::Both);
                return Ok(());
            }
        }
    }

    /// Read newline-delimited frames until the peer goes away, sends garbage,
    /// or shutdown is requested
    fn receive_loop(
        context: &ConnectionContext,
        stream: &TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        let mut reader = BufReader::new(stream);
        let mut frame = Vec::new();
        loop {
            if context.shutdown.is_triggered() {
                return Ok(());
            }

            let remaining = (MAX_FRAME_BYTES - frame.len()) as u64;
            match reader.by_ref().take(remaining).read_until(b'\n', &mut frame) {
                Ok(_) if frame.last() == Some(&b'\n') => {
                    let snapshot: Snapshot = decode_frame(&frame)?;
                    frame.clear();
                    debug!(
                        "Received {} blocks from {peer_addr}",
                        snapshot.get_blockchain().len()
                    );
                    if context.snapshots.send(snapshot).is_err() {
                        return Ok(());
                    }
                }
                Ok(_) if frame.len() >= MAX_FRAME_BYTES => {
                    return Err(BlockchainError::MalformedMessage(format!(
                        "Frame from {peer_addr} exceeds {MAX_FRAME_BYTES} bytes"
                    )));
                }
                Ok(_) => {
                    info!("Peer {peer_addr} closed the stream");
                    return Ok(());
                }
                // Partial frames stay buffered across read timeouts.
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    return Err(BlockchainError::Network(format!(
                        "Failed to read from {peer_addr}: {e}"
                    )))
                }
            }
        }
    }
}
