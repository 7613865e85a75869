use crate::error::{BlockchainError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_NODE_ADDR: &str = "127.0.0.1:10000";
pub const DEFAULT_SIGNATURE: &str = "anonymous";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const SIGNATURE_KEY: &str = "SIG";
const MINER_KEY: &str = "MINER";

/// Node configuration. Values are layered: defaults, then an optional TOML
/// file, then environment variables, then command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the gossip listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Producer identity stamped on mined blocks and created records
    #[serde(default = "default_signature")]
    pub signature: String,

    /// Peers dialed at startup
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_listen_addr() -> String {
    DEFAULT_NODE_ADDR.to_string()
}

fn default_signature() -> String {
    DEFAULT_SIGNATURE.to_string()
}

fn default_max_connections() -> usize {
    8
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            signature: default_signature(),
            peers: Vec::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Throttle after every failed puzzle attempt
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Idle time between mining rounds
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// A block carries up to `batch_limit + 1` pending records
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

fn default_interval_ms() -> u64 {
    25
}

fn default_pause_ms() -> u64 {
    5000
}

fn default_batch_limit() -> usize {
    10
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
            pause_ms: default_pause_ms(),
            batch_limit: default_batch_limit(),
        }
    }
}

impl MiningConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Only adopt a longer peer chain after validating it from genesis
    #[serde(default)]
    pub strict: bool,

    /// Bound on snapshots queued between receivers and the merge worker
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_broadcast_interval_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: default_broadcast_interval_ms(),
            strict: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl SyncConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
}

impl Config {
    /// Load a TOML config file. Missing sections and keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read config from {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&contents).map_err(|e| {
            BlockchainError::Config(format!("Failed to parse config from {}: {e}", path.display()))
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, overlaid with `path` if given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BlockchainError::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `NODE_ADDRESS`, `SIG` and `MINER` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node.listen_addr = addr;
        }
        if let Some(signature) = lookup(SIGNATURE_KEY) {
            self.node.signature = signature;
        }
        if let Some(miner) = lookup(MINER_KEY) {
            self.mining.enabled = parse_flag(MINER_KEY, &miner)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.signature.is_empty() {
            return Err(BlockchainError::Config(
                "Signature must not be empty".to_string(),
            ));
        }
        if self.node.max_connections == 0 {
            return Err(BlockchainError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.sync.channel_capacity == 0 {
            return Err(BlockchainError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(BlockchainError::Config(format!(
            "Invalid value for {key}: {other}"
        ))),
    }
}
