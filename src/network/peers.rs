use crate::error::{BlockchainError, Result};
use log::info;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

/// Connection bookkeeping for inbound and dialed peers
///
/// - Tracks which peer streams are open
/// - Enforces the connection limit
/// - No discovery, reputation or retry logic: peers come from configuration
#[derive(Debug, Clone)]
pub struct PeerManager {
    connected_peers: Arc<RwLock<HashSet<SocketAddr>>>,
    max_connections: usize,
}

impl PeerManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connected_peers: Arc::new(RwLock::new(HashSet::new())),
            max_connections,
        }
    }

    /// Record an open stream. Fails once the connection limit is reached.
    pub fn record_connection(&self, address: SocketAddr) -> Result<()> {
        let mut connected = self
            .connected_peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;

        if connected.len() >= self.max_connections && !connected.contains(&address) {
            return Err(BlockchainError::Network(format!(
                "Connection limit of {} reached, refusing {address}",
                self.max_connections
            )));
        }

        connected.insert(address);
        info!("Connected to peer: {address}");
        Ok(())
    }

    pub fn record_disconnection(&self, address: SocketAddr) -> Result<()> {
        let mut connected = self
            .connected_peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;

        connected.remove(&address);
        info!("Disconnected from peer: {address}");
        Ok(())
    }

    pub fn get_connected_addresses(&self) -> Result<HashSet<SocketAddr>> {
        let connected = self
            .connected_peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(connected.clone())
    }

    pub fn get_connected_count(&self) -> Result<usize> {
        let connected = self
            .connected_peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(connected.len())
    }

    pub fn should_accept_connection(&self) -> Result<bool> {
        let connected_count = self.get_connected_count()?;
        Ok(connected_count < self.max_connections)
    }

    pub fn get_max_connections(&self) -> usize {
        self.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_manager_creation() {
        let manager = PeerManager::new(8);
        assert_eq!(manager.get_connected_count().unwrap(), 0);
        assert_eq!(manager.get_max_connections(), 8);
    }

    #[test]
    fn test_connection_tracking() {
        let manager = PeerManager::new(8);
        let addr = "127.0.0.1:10001".parse().unwrap();

        manager.record_connection(addr).unwrap();
        assert_eq!(manager.get_connected_count().unwrap(), 1);
        assert!(manager.get_connected_addresses().unwrap().contains(&addr));

        manager.record_disconnection(addr).unwrap();
        assert_eq!(manager.get_connected_count().unwrap(), 0);
    }

    #[test]
    fn test_connection_limits() {
        let manager = PeerManager::new(2);
        let addr1 = "127.0.0.1:10001".parse().unwrap();
        let addr2 = "127.0.0.1:10002".parse().unwrap();
        let addr3 = "127.0.0.1:10003".parse().unwrap();

        assert!(manager.should_accept_connection().unwrap());
        manager.record_connection(addr1).unwrap();
        manager.record_connection(addr2).unwrap();

        assert!(!manager.should_accept_connection().unwrap());
        assert!(manager.record_connection(addr3).is_err());
        // Re-recording a known peer is not a new connection.
        manager.record_connection(addr1).unwrap();
    }
}
