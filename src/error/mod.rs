//! Error handling for the ledger
//!
//! Validation failures are ordinary values: a rejected block is simply not
//! appended and a rejected peer message is simply not adopted.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Which of the two puzzle tracks a difficulty value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyTrack {
    /// Classic proof-of-work track
    Pow,
    /// Reduced track unlocked by a record-breaking solution candidate
    Pows,
}

impl fmt::Display for DifficultyTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyTrack::Pow => write!(f, "pow"),
            DifficultyTrack::Pows => write!(f, "pows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockchainError {
    /// Index, previous-hash or content-hash linkage is broken
    StructuralMismatch(String),
    /// Stored difficulty disagrees with the recomputed one
    DifficultyMismatch {
        track: DifficultyTrack,
        expected: i64,
        actual: i64,
    },
    /// Hash does not carry enough leading zero bits for its track
    PuzzleUnmet { difficulty: i64, leading_zeros: u32 },
    /// Record id already included in an accepted block
    DuplicateRecord(String),
    /// Peer payload could not be parsed
    MalformedMessage(String),
    /// Chain validation failed at the given block index
    InvalidChain {
        index: u64,
        source: Box<BlockchainError>,
    },
    /// Network communication errors
    Network(String),
    /// Configuration errors
    Config(String),
    /// Serialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Shared state could not be locked
    State(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::StructuralMismatch(msg) => write!(f, "Structural mismatch: {msg}"),
            BlockchainError::DifficultyMismatch {
                track,
                expected,
                actual,
            } => write!(
                f,
                "Difficulty mismatch on {track} track: expected {expected}, found {actual}"
            ),
            BlockchainError::PuzzleUnmet {
                difficulty,
                leading_zeros,
            } => write!(
                f,
                "Puzzle unmet: hash has {leading_zeros} leading zero bits, {difficulty} required"
            ),
            BlockchainError::DuplicateRecord(id) => write!(f, "Duplicate record: {id}"),
            BlockchainError::MalformedMessage(msg) => write!(f, "Malformed message: {msg}"),
            BlockchainError::InvalidChain { index, source } => {
                write!(f, "Invalid chain at block {index}: {source}")
            }
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::State(msg) => write!(f, "State error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
