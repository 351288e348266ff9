//! Client error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] airtouch_protocol::ProtocolError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("not connected")]
    NotConnected,

    #[error("already connected or connecting")]
    AlreadyConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect timeout")]
    Timeout,
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Timeout
                | ClientError::ConnectionClosed
                | ClientError::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airtouch_protocol::ProtocolError;

    #[test]
    fn test_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(ClientError::Io(io).is_retryable());
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::NotConnected.is_retryable());

        assert!(!ClientError::AlreadyConnected.is_retryable());
        assert!(!ClientError::Protocol(ProtocolError::UnitOutOfRange(20)).is_retryable());
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: ClientError = ProtocolError::GroupOutOfRange(70).into();
        assert!(err.to_string().contains("70"));
    }
}
