//! Peer-to-peer gossip
//!
//! Nodes exchange their whole chain and pending pool as newline-delimited
//! JSON snapshots over plain TCP streams.

pub mod peers;
pub mod server;

pub use peers::PeerManager;
pub use server::{Server, MAX_FRAME_BYTES};
