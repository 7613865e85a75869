//! Configuration management
//!
//! Node, mining and sync settings loaded from an optional TOML file and
//! overridden by the environment and the command line.

pub mod settings;

pub use settings::{Config, MiningConfig, NodeConfig, SyncConfig};
