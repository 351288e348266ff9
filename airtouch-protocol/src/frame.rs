//! Binary frame format spoken by the touchpad controller.
//!
//! Frame layout (6 bytes header + length + body + checksum):
//!
//! ```text
//! +--------+---------+------------+--------------+-------------+---------+--------+
//! | magic  | address | message id | message type | body length |  body   | crc16  |
//! | 2 bytes| 2 bytes |   1 byte   |    1 byte    |   2 bytes   | n bytes | 2 bytes|
//! +--------+---------+------------+--------------+-------------+---------+--------+
//! ```
//!
//! Multi-byte fields are big-endian. The CRC covers everything between the
//! magic and the checksum itself.

use crate::crc::Crc16;
use crate::error::ProtocolError;
use crate::message::SubMessageType;
use crate::{ADDRESS, HEADER_MAGIC, MESSAGE_TYPE_CONTROL_STATUS};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed frame header (magic, address, id, type).
pub const FRAME_HEADER_SIZE: usize = 6;

/// Largest body the 16-bit length field can describe.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

const LENGTH_SIZE: usize = 2;
const CRC_SIZE: usize = 2;

/// A complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub magic: [u8; 2],
    pub address: [u8; 2],
    /// Correlation token, never zero on frames we send.
    pub message_id: u8,
    pub message_type: u8,
    pub body: Bytes,
}

impl Frame {
    /// Creates an outbound frame addressed to the controller.
    pub fn new(message_id: u8, body: Bytes) -> Self {
        Self {
            magic: HEADER_MAGIC,
            address: ADDRESS,
            message_id,
            message_type: MESSAGE_TYPE_CONTROL_STATUS,
            body,
        }
    }

    /// Creates a frame the way the controller sends it (address reversed).
    pub fn from_controller(message_id: u8, body: Bytes) -> Self {
        Self {
            address: [ADDRESS[1], ADDRESS[0]],
            ..Self::new(message_id, body)
        }
    }

    /// Returns whether magic and address match what the controller sends.
    pub fn has_controller_header(&self) -> bool {
        self.magic == HEADER_MAGIC && self.address[1] == ADDRESS[0]
    }

    /// Sub-message type carried in the first body byte, if any.
    pub fn sub_message_type(&self) -> Option<SubMessageType> {
        self.body.first().map(|&b| SubMessageType::from(b))
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        if self.body.len() > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge(self.body.len()));
        }

        let mut buf =
            BytesMut::with_capacity(FRAME_HEADER_SIZE + LENGTH_SIZE + self.body.len() + CRC_SIZE);

        buf.put_slice(&self.magic);
        buf.put_slice(&self.address);
        buf.put_u8(self.message_id);
        buf.put_u8(self.message_type);
        buf.put_u16(self.body.len() as u16);
        buf.put_slice(&self.body);

        let mut crc = Crc16::new();
        crc.update(&buf[HEADER_MAGIC.len()..]);
        buf.put_u16(crc.finish());

        Ok(buf)
    }
}

#[derive(Debug, Clone)]
enum DecodeState {
    AwaitingHeader,
    AwaitingLength {
        header: [u8; FRAME_HEADER_SIZE],
    },
    AwaitingBody {
        header: [u8; FRAME_HEADER_SIZE],
        len: u16,
    },
    AwaitingCrc {
        header: [u8; FRAME_HEADER_SIZE],
        body: Bytes,
    },
}

/// Incremental frame reader.
///
/// Consumes bytes from a buffer as they become available and keeps track of
/// which part of the frame it is waiting for, so it works no matter how the
/// transport splits the stream.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
        }
    }

    /// Returns whether part of a frame has been consumed but not yet emitted.
    pub fn is_mid_frame(&self) -> bool {
        !matches!(self.state, DecodeState::AwaitingHeader)
    }

    /// Drops any partially read frame.
    pub fn reset(&mut self) {
        self.state = DecodeState::AwaitingHeader;
    }

    /// Attempts to decode the next frame from `buf`.
    ///
    /// Returns `Ok(Some(frame))` when a frame is complete, `Ok(None)` if more
    /// data is needed. A checksum mismatch consumes the offending frame and
    /// returns [`ProtocolError::CrcMismatch`]; decoding can continue with the
    /// next call.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        loop {
            let state = std::mem::replace(&mut self.state, DecodeState::AwaitingHeader);
            match state {
                DecodeState::AwaitingHeader => {
                    if buf.len() < FRAME_HEADER_SIZE {
                        return Ok(None);
                    }
                    let mut header = [0u8; FRAME_HEADER_SIZE];
                    buf.copy_to_slice(&mut header);
                    self.state = DecodeState::AwaitingLength { header };
                }
                DecodeState::AwaitingLength { header } => {
                    if buf.len() < LENGTH_SIZE {
                        self.state = state;
                        return Ok(None);
                    }
                    let len = buf.get_u16();
                    self.state = DecodeState::AwaitingBody { header, len };
                }
                DecodeState::AwaitingBody { header, len } => {
                    if buf.len() < len as usize {
                        self.state = state;
                        return Ok(None);
                    }
                    let body = buf.split_to(len as usize).freeze();
                    self.state = DecodeState::AwaitingCrc { header, body };
                }
                DecodeState::AwaitingCrc { header, body } => {
                    if buf.len() < CRC_SIZE {
                        self.state = DecodeState::AwaitingCrc { header, body };
                        return Ok(None);
                    }
                    let expected = buf.get_u16();

                    let mut crc = Crc16::new();
                    crc.update(&header[HEADER_MAGIC.len()..]);
                    crc.update(&(body.len() as u16).to_be_bytes());
                    crc.update(&body);
                    let actual = crc.finish();

                    if actual != expected {
                        return Err(ProtocolError::CrcMismatch {
                            message_id: header[4],
                            expected,
                            actual,
                        });
                    }

                    return Ok(Some(Frame {
                        magic: [header[0], header[1]],
                        address: [header[2], header[3]],
                        message_id: header[4],
                        message_type: header[5],
                        body,
                    }));
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
