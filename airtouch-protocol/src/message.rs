//! Sub-message envelope carried in every frame body.
//!
//! Body layout (8 bytes sub-header + normal data + repeat data):
//!
//! ```text
//! +----------+------+-------------+-------------+--------------+-------------+-------------+
//! | sub type | 0x00 | normal len  | unit length | unit count   | normal data | repeat data |
//! |  1 byte  |1 byte|   2 bytes   |   2 bytes   |   2 bytes    |             |             |
//! +----------+------+-------------+-------------+--------------+-------------+-------------+
//! ```
//!
//! The vendor documentation lists the repeat count before the repeat length.
//! The controller sends and expects them the other way round, as above.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the sub-message header.
pub const SUB_HEADER_SIZE: usize = 8;

/// Sub-message types understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubMessageType {
    GroupControl,
    GroupStatus,
    AcControl,
    AcStatus,
    /// Emitted by firmware revisions this crate does not know about.
    Unknown(u8),
}

impl SubMessageType {
    pub fn code(self) -> u8 {
        match self {
            SubMessageType::GroupControl => 0x20,
            SubMessageType::GroupStatus => 0x21,
            SubMessageType::AcControl => 0x22,
            SubMessageType::AcStatus => 0x23,
            SubMessageType::Unknown(code) => code,
        }
    }
}

impl From<u8> for SubMessageType {
    fn from(code: u8) -> Self {
        match code {
            0x20 => SubMessageType::GroupControl,
            0x21 => SubMessageType::GroupStatus,
            0x22 => SubMessageType::AcControl,
            0x23 => SubMessageType::AcStatus,
            other => SubMessageType::Unknown(other),
        }
    }
}

/// A frame body: sub-message type plus a block of fixed-size repeat units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMessage {
    pub sub_type: SubMessageType,
    /// Size of one repeat unit as announced on the wire.
    pub unit_length: u16,
    /// Number of repeat units as announced on the wire.
    pub unit_count: u16,
    pub repeat_data: Bytes,
}

impl SubMessage {
    /// Builds a sub-message from whole repeat units.
    ///
    /// Fails if the unit count does not fit the 16-bit count field.
    pub fn with_units(
        sub_type: SubMessageType,
        unit_length: u16,
        units: Bytes,
    ) -> Result<Self, ProtocolError> {
        let unit_count = if unit_length == 0 {
            0
        } else {
            let count = units.len() / usize::from(unit_length);
            u16::try_from(count).map_err(|_| ProtocolError::TooManyUnits(count))?
        };
        Ok(Self {
            sub_type,
            unit_length,
            unit_count,
            repeat_data: units,
        })
    }

    /// Builds the poll request for a status sub-message type. Length and
    /// count are both zero.
    pub fn status_request(sub_type: SubMessageType) -> Self {
        Self {
            sub_type,
            unit_length: 0,
            unit_count: 0,
            repeat_data: Bytes::new(),
        }
    }

    /// Encodes the body.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SUB_HEADER_SIZE + self.repeat_data.len());
        buf.put_u8(self.sub_type.code());
        buf.put_u8(0);
        // No message kind used here carries normal data.
        buf.put_u16(0);
        buf.put_u16(self.unit_length);
        buf.put_u16(self.unit_count);
        buf.put_slice(&self.repeat_data);
        buf.freeze()
    }

    /// Parses a frame body.
    ///
    /// Announced normal data is skipped. Whatever follows is the repeat data,
    /// which is not checked against the announced length and count here.
    pub fn parse(body: &Bytes) -> Result<Self, ProtocolError> {
        if body.len() < SUB_HEADER_SIZE {
            return Err(ProtocolError::TruncatedBody {
                len: body.len(),
                needed: SUB_HEADER_SIZE,
            });
        }

        let normal_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let unit_length = u16::from_be_bytes([body[4], body[5]]);
        let unit_count = u16::from_be_bytes([body[6], body[7]]);
        let repeat_start = (SUB_HEADER_SIZE + normal_len).min(body.len());

        Ok(Self {
            sub_type: SubMessageType::from(body[0]),
            unit_length,
            unit_count,
            repeat_data: body.slice(repeat_start..),
        })
    }
}
