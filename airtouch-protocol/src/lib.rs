//! # airtouch-protocol
//!
//! Wire protocol implementation for the Airtouch2+ touchpad controller.
//!
//! This crate provides:
//! - Binary framing with a 16-bit length prefix and Modbus CRC-16 validation
//! - An incremental frame decoder that tolerates partial reads
//! - Bit-packed AC and group (zone) control commands
//! - AC and group status decoding
//! - Protocol constants and error types

pub mod codec;
pub mod control;
pub mod crc;
pub mod error;
pub mod frame;
pub mod message;
pub mod status;

pub use codec::{Decoder, Encoder, StatusMessage};
pub use control::{
    AcControl, AcMode, AcPower, FanSpeed, GroupControl, GroupPower, GroupSetting,
    HeatingCoolingState,
};
pub use crc::{crc16, Crc16};
pub use error::ProtocolError;
pub use frame::{Frame, FrameDecoder, FRAME_HEADER_SIZE};
pub use message::{SubMessage, SubMessageType, SUB_HEADER_SIZE};
pub use status::{
    decode_ac_status, decode_group_status, encode_ac_status, encode_group_status, AcPowerState,
    AcStatus, GroupPowerState, GroupStatus, StatusReport,
};

/// Magic bytes opening every frame.
pub const HEADER_MAGIC: [u8; 2] = [0x55, 0x55];

/// Address bytes written by this client. The controller answers with them
/// reversed, so inbound frames carry `ADDRESS[0]` at header offset 3.
pub const ADDRESS: [u8; 2] = [0x80, 0xb0];

/// Message type used for both control commands and status traffic.
pub const MESSAGE_TYPE_CONTROL_STATUS: u8 = 0xc0;

/// TCP port the touchpad controller listens on.
pub const DEFAULT_PORT: u16 = 9200;
