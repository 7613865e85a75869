use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pow-ledger")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(long = "config", help = "TOML configuration file")]
        config: Option<PathBuf>,
        #[arg(long = "listen", help = "Address to accept peer streams on")]
        listen: Option<String>,
        #[arg(long = "peer", help = "Peer address to dial, may be repeated")]
        peers: Vec<String>,
        #[arg(long = "miner", help = "Mine blocks on this node")]
        miner: bool,
        #[arg(long = "signature", help = "Producer identity for blocks and records")]
        signature: Option<String>,
        #[arg(long = "strict", help = "Validate longer peer chains before adopting them")]
        strict: bool,
    },
    #[command(name = "validate", about = "Validate a snapshot file")]
    Validate {
        #[arg(help = "JSON snapshot as sent between peers")]
        file: PathBuf,
    },
}

/// Overlay command-line flags onto an already loaded configuration. Flags
/// only ever switch features on; absent flags leave the file or environment
/// value in place.
pub fn apply_node_flags(
    config: &mut Config,
    listen: Option<String>,
    peers: Vec<String>,
    miner: bool,
    signature: Option<String>,
    strict: bool,
) {
    if let Some(listen) = listen {
        config.node.listen_addr = listen;
    }
    config.node.peers.extend(peers);
    if miner {
        config.mining.enabled = true;
    }
    if let Some(signature) = signature {
        config.node.signature = signature;
    }
    if strict {
        config.sync.strict = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_startnode() {
        let opt = Opt::try_parse_from([
            "pow-ledger",
            "startnode",
            "--listen",
            "127.0.0.1:10001",
            "--peer",
            "127.0.0.1:10000",
            "--peer",
            "127.0.0.1:10002",
            "--miner",
            "--signature",
            "alice",
        ])
        .unwrap();

        match opt.command {
            Command::StartNode {
                config,
                listen,
                peers,
                miner,
                signature,
                strict,
            } => {
                assert!(config.is_none());
                assert_eq!(listen.as_deref(), Some("127.0.0.1:10001"));
                assert_eq!(peers.len(), 2);
                assert!(miner);
                assert_eq!(signature.as_deref(), Some("alice"));
                assert!(!strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let opt = Opt::try_parse_from(["pow-ledger", "validate", "snapshot.json"]).unwrap();
        assert!(matches!(opt.command, Command::Validate { file } if file == PathBuf::from("snapshot.json")));
    }

    #[test]
    fn test_flags_overlay_config() {
        let mut config = Config::default();
        config.node.peers.push("127.0.0.1:9000".to_string());
        apply_node_flags(
            &mut config,
            Some("0.0.0.0:10005".to_string()),
            vec!["127.0.0.1:9001".to_string()],
            true,
            None,
            true,
        );
        assert_eq!(config.node.listen_addr, "0.0.0.0:10005");
        assert_eq!(config.node.peers.len(), 2);
        assert!(config.mining.enabled);
        assert_eq!(config.node.signature, "anonymous");
        assert!(config.sync.strict);
    }
}
