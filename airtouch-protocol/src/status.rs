//! AC and group status reports broadcast by the controller.

use crate::control::{decode_setpoint, AcMode, FanSpeed};
use crate::error::ProtocolError;
use crate::message::{SubMessage, SubMessageType};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Size of one AC status repeat unit.
pub const AC_STATUS_UNIT_SIZE: usize = 10;

/// Size of one group status repeat unit.
pub const GROUP_STATUS_UNIT_SIZE: usize = 8;

const TEMPERATURE_OFFSET: i32 = 500;

/// AC power state as reported (4-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcPowerState {
    Off,
    On,
    AwayOff,
    AwayOn,
    Sleep,
    Unknown(u8),
}

impl AcPowerState {
    pub fn code(self) -> u8 {
        match self {
            AcPowerState::Off => 0,
            AcPowerState::On => 1,
            AcPowerState::AwayOff => 2,
            AcPowerState::AwayOn => 3,
            AcPowerState::Sleep => 5,
            AcPowerState::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AcPowerState::Off,
            1 => AcPowerState::On,
            2 => AcPowerState::AwayOff,
            3 => AcPowerState::AwayOn,
            5 => AcPowerState::Sleep,
            other => AcPowerState::Unknown(other),
        }
    }

    /// Returns whether the compressor is running in any on-state.
    pub fn is_on(self) -> bool {
        matches!(
            self,
            AcPowerState::On | AcPowerState::AwayOn | AcPowerState::Sleep
        )
    }
}

/// Group power state as reported (2-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupPowerState {
    Off,
    On,
    Turbo,
    Unknown(u8),
}

impl GroupPowerState {
    pub fn code(self) -> u8 {
        match self {
            GroupPowerState::Off => 0,
            GroupPowerState::On => 1,
            GroupPowerState::Turbo => 3,
            GroupPowerState::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => GroupPowerState::Off,
            1 => GroupPowerState::On,
            3 => GroupPowerState::Turbo,
            other => GroupPowerState::Unknown(other),
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, GroupPowerState::On | GroupPowerState::Turbo)
    }
}

/// Status of one AC unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcStatus {
    pub unit: u8,
    pub power: AcPowerState,
    pub mode: AcMode,
    pub fan_speed: FanSpeed,
    /// Target temperature in °C.
    pub target_temperature: f32,
    /// Measured temperature in °C.
    pub current_temperature: f32,
    pub spill: bool,
    pub timer_set: bool,
    pub error_code: u16,
}

impl AcStatus {
    /// Decodes one 10-byte repeat unit.
    pub fn decode_unit(unit: &[u8; AC_STATUS_UNIT_SIZE]) -> Self {
        let raw_temperature = i32::from(u16::from_be_bytes([unit[4], unit[5]]));
        Self {
            unit: unit[0] & 0x0f,
            power: AcPowerState::from_code(unit[0] >> 4),
            mode: AcMode::from_code(unit[1] >> 4),
            fan_speed: FanSpeed::from_code(unit[1] & 0x0f),
            target_temperature: decode_setpoint(unit[2]),
            current_temperature: (raw_temperature - TEMPERATURE_OFFSET) as f32 / 10.0,
            spill: unit[3] & 0b10 != 0,
            timer_set: unit[3] & 0b01 != 0,
            error_code: u16::from_be_bytes([unit[6], unit[7]]),
        }
    }

    /// Packs the record back into its 10-byte repeat unit.
    pub fn encode_unit(&self) -> [u8; AC_STATUS_UNIT_SIZE] {
        let setpoint = ((self.target_temperature * 10.0).round() as i32 - 100).clamp(0, 255) as u8;
        let raw_temperature = ((self.current_temperature * 10.0).round() as i32
            + TEMPERATURE_OFFSET)
            .clamp(0, i32::from(u16::MAX)) as u16;
        let flags = (u8::from(self.spill) << 1) | u8::from(self.timer_set);
        let temperature = raw_temperature.to_be_bytes();
        let error = self.error_code.to_be_bytes();

        [
            (self.unit & 0x0f) | ((self.power.code() & 0x0f) << 4),
            (self.fan_speed.code() & 0x0f) | ((self.mode.code() & 0x0f) << 4),
            setpoint,
            flags,
            temperature[0],
            temperature[1],
            error[0],
            error[1],
            0,
            0,
        ]
    }
}

/// Status of one group (zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group: u8,
    pub power: GroupPowerState,
    /// Damper opening in percent.
    pub damper_percent: u8,
    pub has_turbo: bool,
    pub has_spill: bool,
}

impl GroupStatus {
    /// Decodes one 8-byte repeat unit.
    pub fn decode_unit(unit: &[u8; GROUP_STATUS_UNIT_SIZE]) -> Self {
        Self {
            group: unit[0] & 0x3f,
            power: GroupPowerState::from_code(unit[0] >> 6),
            damper_percent: unit[1] & 0x7f,
            has_turbo: unit[6] & 0b1000_0000 != 0,
            has_spill: unit[6] & 0b0000_0010 != 0,
        }
    }

    /// Packs the record back into its 8-byte repeat unit.
    pub fn encode_unit(&self) -> [u8; GROUP_STATUS_UNIT_SIZE] {
        let flags = (u8::from(self.has_turbo) << 7) | (u8::from(self.has_spill) << 1);
        [
            (self.group & 0x3f) | ((self.power.code() & 0b11) << 6),
            self.damper_percent & 0x7f,
            0,
            0,
            0,
            0,
            flags,
            0,
        ]
    }
}

/// Records decoded from one status message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport<T> {
    /// Unit count announced by the controller.
    pub declared_count: u16,
    /// Bytes of repeat data actually present.
    pub repeat_data_len: usize,
    pub records: Vec<T>,
    unit_size: usize,
}

impl<T> StatusReport<T> {
    /// Returns whether the announced count matches the data present.
    pub fn is_consistent(&self) -> bool {
        usize::from(self.declared_count) * self.unit_size == self.repeat_data_len
    }

    /// Trailing bytes that did not form a whole unit.
    pub fn discarded_bytes(&self) -> usize {
        self.repeat_data_len % self.unit_size
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }
}

fn decode_report<T, const N: usize>(
    body: &Bytes,
    expected: SubMessageType,
    decode_unit: impl Fn(&[u8; N]) -> T,
) -> Result<StatusReport<T>, ProtocolError> {
    let message = SubMessage::parse(body)?;
    if message.sub_type != expected {
        return Err(ProtocolError::UnexpectedSubMessage {
            expected: expected.code(),
            actual: message.sub_type.code(),
        });
    }

    let records = message
        .repeat_data
        .chunks_exact(N)
        .filter_map(|chunk| <&[u8; N]>::try_from(chunk).ok())
        .map(decode_unit)
        .collect();

    Ok(StatusReport {
        declared_count: message.unit_count,
        repeat_data_len: message.repeat_data.len(),
        records,
        unit_size: N,
    })
}

/// Decodes an AC status body into one record per whole 10-byte unit.
pub fn decode_ac_status(body: &Bytes) -> Result<StatusReport<AcStatus>, ProtocolError> {
    decode_report(body, SubMessageType::AcStatus, AcStatus::decode_unit)
}

/// Decodes a group status body into one record per whole 8-byte unit.
pub fn decode_group_status(body: &Bytes) -> Result<StatusReport<GroupStatus>, ProtocolError> {
    decode_report(body, SubMessageType::GroupStatus, GroupStatus::decode_unit)
}

/// Encodes AC status records the way the controller broadcasts them.
pub fn encode_ac_status(records: &[AcStatus]) -> Result<Bytes, ProtocolError> {
    let mut data = BytesMut::with_capacity(records.len() * AC_STATUS_UNIT_SIZE);
    for record in records {
        data.put_slice(&record.encode_unit());
    }
    SubMessage::with_units(
        SubMessageType::AcStatus,
        AC_STATUS_UNIT_SIZE as u16,
        data.freeze(),
    )
    .map(|message| message.encode())
}

/// Encodes group status records the way the controller broadcasts them.
pub fn encode_group_status(records: &[GroupStatus]) -> Result<Bytes, ProtocolError> {
    let mut data = BytesMut::with_capacity(records.len() * GROUP_STATUS_UNIT_SIZE);
    for record in records {
        data.put_slice(&record.encode_unit());
    }
    SubMessage::with_units(
        SubMessageType::GroupStatus,
        GROUP_STATUS_UNIT_SIZE as u16,
        data.freeze(),
    )
    .map(|message| message.encode())
}
