//! Utility functions and helpers
//!
//! Hashing, clocks, wire encoding helpers and the shutdown token shared by
//! every long-running task.

pub mod crypto;
pub mod serialization;
pub mod shutdown;

pub use crypto::{current_timestamp, sha256_digest, sha256_hex};
pub use serialization::{decode_frame, encode_frame};
pub use shutdown::Shutdown;
