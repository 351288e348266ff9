//! AC and group (zone) control commands.
//!
//! Each command is sent as a single 4-byte repeat unit. Fields left as `None`
//! are transmitted as the controller's "keep current value" code.

use crate::error::ProtocolError;
use crate::message::{SubMessage, SubMessageType};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of one AC or group control repeat unit.
pub const CONTROL_UNIT_SIZE: u16 = 4;

/// Highest AC unit number (4-bit field).
pub const MAX_AC_UNIT: u8 = 0x0f;

/// Highest group number (6-bit field).
pub const MAX_GROUP: u8 = 0x3f;

/// Lowest target temperature that fits the setpoint byte.
pub const MIN_SETPOINT: f32 = 10.0;

/// Highest target temperature that fits the setpoint byte.
pub const MAX_SETPOINT: f32 = 35.5;

/// Setpoint transmitted alongside the "keep" selector.
pub const DEFAULT_SETPOINT: f32 = 25.0;

const AC_POWER_KEEP: u8 = 0;
const AC_MODE_KEEP: u8 = 5;
const FAN_SPEED_KEEP: u8 = 7;
const SETPOINT_KEEP: u8 = 0x00;
const SETPOINT_SET_VALUE: u8 = 0x40;
const GROUP_POWER_KEEP: u8 = 0;
const GROUP_SETTING_KEEP: u8 = 0;
const GROUP_SETTING_MASK: u8 = 0b1110_0111;

/// AC power command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcPower {
    Toggle,
    Off,
    On,
}

impl AcPower {
    pub fn code(self) -> u8 {
        match self {
            AcPower::Toggle => 1,
            AcPower::Off => 2,
            AcPower::On => 3,
        }
    }
}

/// AC operating mode, shared by control commands and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcMode {
    Auto,
    Heat,
    Dry,
    Fan,
    Cool,
    Unknown(u8),
}

impl AcMode {
    pub fn code(self) -> u8 {
        match self {
            AcMode::Auto => 0,
            AcMode::Heat => 1,
            AcMode::Dry => 2,
            AcMode::Fan => 3,
            AcMode::Cool => 4,
            AcMode::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AcMode::Auto,
            1 => AcMode::Heat,
            2 => AcMode::Dry,
            3 => AcMode::Fan,
            4 => AcMode::Cool,
            other => AcMode::Unknown(other),
        }
    }
}

/// AC fan speed, shared by control commands and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanSpeed {
    Auto,
    Quiet,
    Low,
    Medium,
    High,
    Powerful,
    Turbo,
    Unknown(u8),
}

impl FanSpeed {
    pub fn code(self) -> u8 {
        match self {
            FanSpeed::Auto => 0,
            FanSpeed::Quiet => 1,
            FanSpeed::Low => 2,
            FanSpeed::Medium => 3,
            FanSpeed::High => 4,
            FanSpeed::Powerful => 5,
            FanSpeed::Turbo => 6,
            FanSpeed::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => FanSpeed::Auto,
            1 => FanSpeed::Quiet,
            2 => FanSpeed::Low,
            3 => FanSpeed::Medium,
            4 => FanSpeed::High,
            5 => FanSpeed::Powerful,
            6 => FanSpeed::Turbo,
            other => FanSpeed::Unknown(other),
        }
    }
}

/// Combined power and mode target, as a thermostat presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatingCoolingState {
    Off,
    Heat,
    Cool,
    Auto,
}

/// Group power command (3-bit field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupPower {
    Toggle,
    Off,
    On,
    Turbo,
}

impl GroupPower {
    pub fn code(self) -> u8 {
        match self {
            GroupPower::Toggle => 1,
            GroupPower::Off => 2,
            GroupPower::On => 3,
            GroupPower::Turbo => 5,
        }
    }
}

/// What the group command's value byte means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupSetting {
    Decrease,
    Increase,
    /// Value byte is the damper opening percentage.
    SetValue,
}

impl GroupSetting {
    pub fn code(self) -> u8 {
        match self {
            GroupSetting::Decrease => 2,
            GroupSetting::Increase => 3,
            GroupSetting::SetValue => 4,
        }
    }
}

/// Encodes a target temperature as `(t * 10) - 100`.
pub(crate) fn encode_setpoint(temperature: f32) -> Result<u8, ProtocolError> {
    if !(MIN_SETPOINT..=MAX_SETPOINT).contains(&temperature) {
        return Err(ProtocolError::TemperatureOutOfRange(temperature));
    }
    Ok(((temperature * 10.0).round() as i32 - 100) as u8)
}

pub(crate) fn decode_setpoint(raw: u8) -> f32 {
    (f32::from(raw) + 100.0) / 10.0
}

/// AC control command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcControl {
    pub unit: u8,
    pub power: Option<AcPower>,
    pub mode: Option<AcMode>,
    pub fan_speed: Option<FanSpeed>,
    /// Target temperature in °C.
    pub target_temperature: Option<f32>,
}

impl AcControl {
    /// Creates a command that keeps every setting of `unit`.
    pub fn new(unit: u8) -> Self {
        Self {
            unit,
            power: None,
            mode: None,
            fan_speed: None,
            target_temperature: None,
        }
    }

    pub fn with_power(mut self, power: AcPower) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_mode(mut self, mode: AcMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_fan_speed(mut self, fan_speed: FanSpeed) -> Self {
        self.fan_speed = Some(fan_speed);
        self
    }

    pub fn with_target_temperature(mut self, temperature: f32) -> Self {
        self.target_temperature = Some(temperature);
        self
    }

    /// Switches the unit on or off.
    pub fn power(unit: u8, on: bool) -> Self {
        Self::new(unit).with_power(if on { AcPower::On } else { AcPower::Off })
    }

    /// Turns the unit off, or on in the matching mode.
    pub fn heating_cooling(unit: u8, state: HeatingCoolingState) -> Self {
        match state {
            HeatingCoolingState::Off => Self::new(unit).with_power(AcPower::Off),
            HeatingCoolingState::Heat => Self::new(unit)
                .with_power(AcPower::On)
                .with_mode(AcMode::Heat),
            HeatingCoolingState::Cool => Self::new(unit)
                .with_power(AcPower::On)
                .with_mode(AcMode::Cool),
            HeatingCoolingState::Auto => Self::new(unit)
                .with_power(AcPower::On)
                .with_mode(AcMode::Auto),
        }
    }

    pub fn target_temperature(unit: u8, temperature: f32) -> Self {
        Self::new(unit).with_target_temperature(temperature)
    }

    pub fn fan_speed(unit: u8, fan_speed: FanSpeed) -> Self {
        Self::new(unit).with_fan_speed(fan_speed)
    }

    /// Packs the command into its 4-byte repeat unit.
    pub fn encode_unit(&self) -> Result<[u8; 4], ProtocolError> {
        if self.unit > MAX_AC_UNIT {
            return Err(ProtocolError::UnitOutOfRange(self.unit));
        }

        let power = self.power.map_or(AC_POWER_KEEP, AcPower::code);
        let mode = self.mode.map_or(AC_MODE_KEEP, AcMode::code) & 0x0f;
        let fan = self.fan_speed.map_or(FAN_SPEED_KEEP, FanSpeed::code) & 0x0f;
        let (setpoint_control, setpoint) = match self.target_temperature {
            Some(temperature) => (SETPOINT_SET_VALUE, encode_setpoint(temperature)?),
            None => (SETPOINT_KEEP, encode_setpoint(DEFAULT_SETPOINT)?),
        };

        Ok([
            self.unit | (power << 4),
            fan | (mode << 4),
            setpoint_control,
            setpoint,
        ])
    }

    pub fn to_sub_message(&self) -> Result<SubMessage, ProtocolError> {
        let unit = self.encode_unit()?;
        SubMessage::with_units(
            SubMessageType::AcControl,
            CONTROL_UNIT_SIZE,
            Bytes::copy_from_slice(&unit),
        )
    }

    /// Encodes the 12-byte AC control body.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        Ok(self.to_sub_message()?.encode())
    }
}

/// Group (zone) control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupControl {
    pub group: u8,
    pub power: Option<GroupPower>,
    pub setting: Option<GroupSetting>,
    /// Meaning depends on `setting`; the damper percentage for `SetValue`.
    pub value: u8,
}

impl GroupControl {
    pub fn new(group: u8) -> Self {
        Self {
            group,
            power: None,
            setting: None,
            value: 0,
        }
    }

    pub fn with_power(mut self, power: GroupPower) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_setting(mut self, setting: GroupSetting, value: u8) -> Self {
        self.setting = Some(setting);
        self.value = value;
        self
    }

    /// Opens or closes the zone.
    pub fn active(group: u8, on: bool) -> Self {
        Self::new(group).with_power(if on { GroupPower::On } else { GroupPower::Off })
    }

    /// Sets the damper opening in percent.
    pub fn damper(group: u8, percent: u8) -> Self {
        Self::new(group).with_setting(GroupSetting::SetValue, percent)
    }

    /// Packs the command into its 4-byte repeat unit.
    pub fn encode_unit(&self) -> Result<[u8; 4], ProtocolError> {
        if self.group > MAX_GROUP {
            return Err(ProtocolError::GroupOutOfRange(self.group));
        }
        if self.setting == Some(GroupSetting::SetValue) && self.value > 100 {
            return Err(ProtocolError::DamperOutOfRange(self.value));
        }

        let power = self.power.map_or(GROUP_POWER_KEEP, GroupPower::code);
        let setting = self.setting.map_or(GROUP_SETTING_KEEP, GroupSetting::code);

        Ok([
            self.group & MAX_GROUP,
            (power | (setting << 5)) & GROUP_SETTING_MASK,
            self.value,
            0,
        ])
    }

    pub fn to_sub_message(&self) -> Result<SubMessage, ProtocolError> {
        let unit = self.encode_unit()?;
        SubMessage::with_units(
            SubMessageType::GroupControl,
            CONTROL_UNIT_SIZE,
            Bytes::copy_from_slice(&unit),
        )
    }

    /// Encodes the 12-byte group control body.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        Ok(self.to_sub_message()?.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ac_control_cool_on() {
        let body = AcControl::new(2)
            .with_power(AcPower::On)
            .with_mode(AcMode::Cool)
            .encode()
            .unwrap();

        assert_eq!(body.len(), 12);
        assert_eq!(body[0], 0x22);
        assert_eq!(body[1], 0);
        assert_eq!(&body[2..4], &[0, 0]);
        assert_eq!(&body[4..6], &[0, 4]);
        assert_eq!(&body[6..8], &[0, 1]);
        assert_eq!(body[8] & 0x0f, 2);
        assert_eq!(body[8] >> 4, AcPower::On.code());
        assert_eq!(body[9] >> 4, AcMode::Cool.code());
        assert_eq!(body[9] & 0x0f, FAN_SPEED_KEEP);
        assert_eq!(body[10], SETPOINT_KEEP);
    }

    #[test]
    fn test_ac_control_all_keep() {
        let unit = AcControl::new(0).encode_unit().unwrap();
        assert_eq!(unit, [0x00, (AC_MODE_KEEP << 4) | FAN_SPEED_KEEP, 0x00, 150]);
    }

    #[test]
    fn test_ac_target_temperature() {
        let unit = AcControl::target_temperature(1, 22.5).encode_unit().unwrap();
        assert_eq!(unit[0], 0x01);
        assert_eq!(unit[2], SETPOINT_SET_VALUE);
        assert_eq!(unit[3], 125);
        assert_eq!(decode_setpoint(unit[3]), 22.5);
    }

    #[test]
    fn test_setpoint_bounds() {
        assert_eq!(encode_setpoint(MIN_SETPOINT).unwrap(), 0);
        assert_eq!(encode_setpoint(MAX_SETPOINT).unwrap(), 255);
        assert!(matches!(
            encode_setpoint(9.5),
            Err(ProtocolError::TemperatureOutOfRange(_))
        ));
        assert!(matches!(
            encode_setpoint(36.0),
            Err(ProtocolError::TemperatureOutOfRange(_))
        ));
        assert!(encode_setpoint(f32::NAN).is_err());
    }

    #[test]
    fn test_ac_fan_speed() {
        let unit = AcControl::fan_speed(3, FanSpeed::High).encode_unit().unwrap();
        assert_eq!(unit[0], 0x03);
        assert_eq!(unit[1], (AC_MODE_KEEP << 4) | FanSpeed::High.code());
    }

    #[test]
    fn test_heating_cooling_states() {
        let off = AcControl::heating_cooling(1, HeatingCoolingState::Off);
        assert_eq!(off.power, Some(AcPower::Off));
        assert_eq!(off.mode, None);

        let heat = AcControl::heating_cooling(1, HeatingCoolingState::Heat);
        assert_eq!(heat.power, Some(AcPower::On));
        assert_eq!(heat.mode, Some(AcMode::Heat));

        let auto = AcControl::heating_cooling(1, HeatingCoolingState::Auto);
        assert_eq!(auto.mode, Some(AcMode::Auto));
    }

    #[test]
    fn test_ac_power_off() {
        let unit = AcControl::power(15, false).encode_unit().unwrap();
        assert_eq!(unit[0], 0x0f | (AcPower::Off.code() << 4));
    }

    #[test]
    fn test_ac_unit_out_of_range() {
        assert_eq!(
            AcControl::new(16).encode(),
            Err(ProtocolError::UnitOutOfRange(16))
        );
    }

    #[test]
    fn test_group_damper() {
        let body = GroupControl::damper(5, 60).encode().unwrap();
        assert_eq!(body.len(), 12);
        assert_eq!(body[0], 0x20);
        assert_eq!(&body[4..8], &[0, 4, 0, 1]);
        assert_eq!(body[8], 5);
        assert_eq!(body[9], GroupSetting::SetValue.code() << 5);
        assert_eq!(body[10], 60);
        assert_eq!(body[11], 0);
    }

    #[test]
    fn test_group_active() {
        let on = GroupControl::active(63, true).encode_unit().unwrap();
        assert_eq!(on, [63, GroupPower::On.code(), 0, 0]);

        let off = GroupControl::active(0, false).encode_unit().unwrap();
        assert_eq!(off[1], GroupPower::Off.code());
    }

    #[test]
    fn test_group_reserved_bits_clear() {
        let unit = GroupControl::new(1)
            .with_power(GroupPower::Turbo)
            .with_setting(GroupSetting::Increase, 0)
            .encode_unit()
            .unwrap();
        assert_eq!(unit[1] & 0b0001_1000, 0);
        assert_eq!(unit[1] & 0b111, GroupPower::Turbo.code());
        assert_eq!(unit[1] >> 5, GroupSetting::Increase.code());
    }

    #[test]
    fn test_group_validation() {
        assert_eq!(
            GroupControl::active(64, true).encode(),
            Err(ProtocolError::GroupOutOfRange(64))
        );
        assert_eq!(
            GroupControl::damper(1, 101).encode(),
            Err(ProtocolError::DamperOutOfRange(101))
        );
    }

    #[test]
    fn test_mode_and_fan_codes() {
        for code in 0u8..16 {
            assert_eq!(AcMode::from_code(code).code(), code);
            assert_eq!(FanSpeed::from_code(code).code(), code);
        }
    }
}
