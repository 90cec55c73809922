//! Protocol error types

use thiserror::Error;

/// Protocol error types
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Message too large
    #[error("message size {0} exceeds maximum {1}")]
    MessageTooLarge(usize, usize),

    /// Invalid message format
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::Serialization("test".to_string());
        assert_eq!(err.to_string(), "serialization error: test");

        let err = ProtocolError::MessageTooLarge(1000, 500);
        assert_eq!(err.to_string(), "message size 1000 exceeds maximum 500");
    }
}
