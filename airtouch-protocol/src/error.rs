//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing, encoding or decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("CRC mismatch on message {message_id}: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        message_id: u8,
        expected: u16,
        actual: u16,
    },

    #[error("body too large: {0} bytes (max 65535)")]
    BodyTooLarge(usize),

    #[error("too many repeat units: {0} (max 65535)")]
    TooManyUnits(usize),

    #[error("body truncated: {len} bytes, sub-message header needs {needed}")]
    TruncatedBody { len: usize, needed: usize },

    #[error("AC unit number out of range: {0} (max 15)")]
    UnitOutOfRange(u8),

    #[error("group number out of range: {0} (max 63)")]
    GroupOutOfRange(u8),

    #[error("target temperature out of range: {0} (must be 10.0 to 35.5)")]
    TemperatureOutOfRange(f32),

    #[error("damper position out of range: {0}% (max 100)")]
    DamperOutOfRange(u8),

    #[error("unexpected sub-message type: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedSubMessage { expected: u8, actual: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::CrcMismatch {
            message_id: 7,
            expected: 0xabcd,
            actual: 0x1234,
        };
        let msg = err.to_string();
        assert!(msg.contains("0xabcd"));
        assert!(msg.contains("0x1234"));
        assert!(msg.contains('7'));

        let err = ProtocolError::TruncatedBody { len: 3, needed: 8 };
        assert!(err.to_string().contains('3'));

        let err = ProtocolError::TooManyUnits(70_000);
        assert!(err.to_string().contains("70000"));

        let err = ProtocolError::UnitOutOfRange(16);
        assert!(err.to_string().contains("16"));

        let err = ProtocolError::GroupOutOfRange(64);
        assert!(err.to_string().contains("64"));

        let err = ProtocolError::DamperOutOfRange(120);
        assert!(err.to_string().contains("120"));

        let err = ProtocolError::UnexpectedSubMessage {
            expected: 0x23,
            actual: 0x21,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x23") && msg.contains("0x21"));
    }
}
