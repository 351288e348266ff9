//! Encoder and decoder for controller frames and status messages.

use crate::error::ProtocolError;
use crate::frame::{Frame, FrameDecoder};
use crate::message::{SubMessage, SubMessageType};
use crate::status::{decode_ac_status, decode_group_status, AcStatus, GroupStatus, StatusReport};
use bytes::BytesMut;

/// Encodes sub-messages into frames.
pub struct Encoder;

impl Encoder {
    /// Wraps a sub-message in a frame with the given message id.
    pub fn encode_sub_message(
        message_id: u8,
        message: &SubMessage,
    ) -> Result<BytesMut, ProtocolError> {
        Frame::new(message_id, message.encode()).encode()
    }
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    Ac(StatusReport<AcStatus>),
    Groups(StatusReport<GroupStatus>),
    /// Any other sub-message type, including control echoes.
    Unknown(SubMessageType),
}

impl StatusMessage {
    /// Dispatches a frame body on its sub-message type.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let sub_type = frame
            .sub_message_type()
            .ok_or(ProtocolError::TruncatedBody {
                len: 0,
                needed: crate::message::SUB_HEADER_SIZE,
            })?;

        match sub_type {
            SubMessageType::AcStatus => Ok(StatusMessage::Ac(decode_ac_status(&frame.body)?)),
            SubMessageType::GroupStatus => {
                Ok(StatusMessage::Groups(decode_group_status(&frame.body)?))
            }
            other => Ok(StatusMessage::Unknown(other)),
        }
    }
}

/// Buffers stream bytes and decodes frames from them.
pub struct Decoder {
    buffer: BytesMut,
    frames: FrameDecoder,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            frames: FrameDecoder::new(),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        self.frames.decode(&mut self.buffer)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether a frame has been partially consumed.
    pub fn is_mid_frame(&self) -> bool {
        self.frames.is_mid_frame()
    }

    /// Clears the buffer and any partially read frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.reset();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AcControl, AcMode, AcPower, FanSpeed};
    use crate::status::{encode_ac_status, encode_group_status, AcPowerState, GroupPowerState};
    use bytes::Bytes;

    fn sample_ac() -> AcStatus {
        AcStatus {
            unit: 0,
            power: AcPowerState::On,
            mode: AcMode::Heat,
            fan_speed: FanSpeed::Low,
            target_temperature: 21.0,
            current_temperature: 19.5,
            spill: false,
            timer_set: false,
            error_code: 0,
        }
    }

    #[test]
    fn test_encode_sub_message() {
        let control = AcControl::new(1).with_power(AcPower::On).to_sub_message().unwrap();
        let encoded = Encoder::encode_sub_message(42, &control).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        let frame = decoder.decode_frame().unwrap().unwrap();

        assert_eq!(frame.message_id, 42);
        assert_eq!(frame.body, control.encode());
        assert_eq!(frame.sub_message_type(), Some(SubMessageType::AcControl));
    }

    #[test]
    fn test_partial_frame_decoding() {
        let encoded = Frame::from_controller(1, encode_ac_status(&[sample_ac()]).unwrap())
            .encode()
            .unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..10]);
        assert!(decoder.decode_frame().unwrap().is_none());
        assert!(decoder.is_mid_frame());

        decoder.extend(&encoded[10..]);
        let frame = decoder.decode_frame().unwrap().unwrap();
        assert_eq!(frame.message_id, 1);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_status_dispatch_ac() {
        let frame = Frame::from_controller(7, encode_ac_status(&[sample_ac()]).unwrap());
        match StatusMessage::from_frame(&frame).unwrap() {
            StatusMessage::Ac(report) => assert_eq!(report.records, vec![sample_ac()]),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_status_dispatch_groups() {
        let group = GroupStatus {
            group: 4,
            power: GroupPowerState::On,
            damper_percent: 75,
            has_turbo: false,
            has_spill: false,
        };
        let frame = Frame::from_controller(8, encode_group_status(&[group]).unwrap());
        match StatusMessage::from_frame(&frame).unwrap() {
            StatusMessage::Groups(report) => assert_eq!(report.records, vec![group]),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_status_dispatch_unknown() {
        let frame = Frame::from_controller(9, Bytes::from_static(&[0x30, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(
            StatusMessage::from_frame(&frame).unwrap(),
            StatusMessage::Unknown(SubMessageType::Unknown(0x30))
        );
    }

    #[test]
    fn test_status_dispatch_empty_body() {
        let frame = Frame::from_controller(9, Bytes::new());
        assert!(matches!(
            StatusMessage::from_frame(&frame),
            Err(ProtocolError::TruncatedBody { len: 0, .. })
        ));
    }

    #[test]
    fn test_decoder_clear() {
        let mut decoder = Decoder::new();
        decoder.extend(&[0x55, 0x55, 0xb0, 0x80, 0x01, 0xc0, 0x00]);
        assert!(decoder.decode_frame().unwrap().is_none());
        assert!(decoder.is_mid_frame());

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn test_decoder_default() {
        let decoder = Decoder::default();
        assert_eq!(decoder.buffered(), 0);
    }
}
