//! Desired air conditioner state.
//!
//! [`DeviceState`] is plain data: it is owned by a single
//! [`Controller`](crate::command::Controller) and only mutated through it.

use crate::consts::{
    FAN_AUTO_CODE, FAN_HIGH_CODE, FAN_LOW_CODE, FAN_MEDIUM_CODE, FAN_OFF_CODE, MODE_AUTO_CODE,
    MODE_COOL_CODE, MODE_DRY_CODE, MODE_FAN_CODE, MODE_HEAT_CODE, TEMP_FALLBACK,
};

/// Operating mode of the unit.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Mode {
    /// The unit picks heating or cooling on its own.
    #[default]
    Auto,
    /// Cooling.
    Cool,
    /// Heating.
    Heat,
    /// Fan only, no compressor.
    Fan,
    /// Dehumidifying.
    Dry,
}

impl Mode {
    /// Command nibble for this mode.
    pub const fn code(self) -> u8 {
        match self {
            Mode::Auto => MODE_AUTO_CODE,
            Mode::Cool => MODE_COOL_CODE,
            Mode::Heat => MODE_HEAT_CODE,
            Mode::Fan => MODE_FAN_CODE,
            Mode::Dry => MODE_DRY_CODE,
        }
    }
}

/// Fan speed of the unit.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FanLevel {
    /// Low speed.
    Low,
    /// Medium speed.
    Medium,
    /// High speed.
    High,
    /// The unit picks the speed.
    #[default]
    Auto,
    /// Fan stopped.
    Off,
}

impl FanLevel {
    /// Fan nibble for this level.
    pub const fn code(self) -> u8 {
        match self {
            FanLevel::Low => FAN_LOW_CODE,
            FanLevel::Medium => FAN_MEDIUM_CODE,
            FanLevel::High => FAN_HIGH_CODE,
            FanLevel::Auto => FAN_AUTO_CODE,
            FanLevel::Off => FAN_OFF_CODE,
        }
    }

    /// Maps the numeric level used by the `fan_level` command.
    ///
    /// `0` is automatic, `1`..=`3` are low to high, `4` stops the fan.
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(FanLevel::Auto),
            1 => Some(FanLevel::Low),
            2 => Some(FanLevel::Medium),
            3 => Some(FanLevel::High),
            4 => Some(FanLevel::Off),
            _ => None,
        }
    }
}

/// The state the air conditioner should be put in.
///
/// Out-of-range temperatures are stored as given; the encoder clamps them.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DeviceState {
    /// Whether the unit should be running.
    pub enabled: bool,
    /// Operating mode.
    pub mode: Mode,
    /// Target temperature in °C.
    pub temperature: i32,
    /// Fan speed.
    pub fan_level: FanLevel,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: Mode::Auto,
            temperature: TEMP_FALLBACK,
            fan_level: FanLevel::Auto,
        }
    }
}
