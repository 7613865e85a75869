//! Command-line interface
//!
//! Argument parsing for the node binary and the interactive operator console.

pub mod commands;
pub mod console;

pub use commands::{apply_node_flags, Command, Opt};
pub use console::{Console, Reply};
