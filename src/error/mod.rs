//! Error handling for the node
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! follow the ledger's failure taxonomy: validation rejections, durable
//! storage failures, per-peer network failures and startup configuration
//! problems.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for ledger, consensus and gossip operations
#[derive(Debug, Clone)]
pub enum BlockchainError {
    /// A block or transaction failed a validity rule (linkage, PoW, shape)
    Validation(String),
    /// Durable record read/write failures
    Persistence(String),
    /// Dial, send or decode failures on a peer connection
    Network(String),
    /// Missing or malformed startup input
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Proof-of-work search errors
    Mining(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Validation(msg) => write!(f, "Validation error: {msg}"),
            BlockchainError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_category() {
        let err = BlockchainError::Validation("invalid previous hash".to_string());
        assert_eq!(err.to_string(), "Validation error: invalid previous hash");

        let err = BlockchainError::Config("DIFFICULTY must be a number".to_string());
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BlockchainError = io.into();
        assert!(matches!(err, BlockchainError::Io(_)));
    }
}
