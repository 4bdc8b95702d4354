//! Application settings persisted through the [`ConfigStore`].
//!
//! Every setting is stored as one [`ConfigItem`] whose id is a [`ConfigId`]. Text settings
//! are stored as raw UTF-8 without a terminator; the MQTT port is a little-endian `u16`.
//!
//! ```rust,ignore
//! let mut store = ConfigStore::new(flash);
//! let mut settings = Settings::load(&mut store);
//! settings.location.clear();
//! settings.location.push_str("kitchen").ok();
//! settings.save(&mut store)?;
//! assert_eq!(settings.cmd_topic(), "/kitchen/esp-gizmo-ir/name_0/cmd");
//! ```

use core::fmt::Write;

use heapless::String;

use crate::config::{ConfigError, ConfigItem, ConfigStore};
use crate::consts::{DEVICE_TYPE, MAX_CONFIG_ITEMS};
use crate::flash::Flash;

/// Capacity of every text setting, in bytes.
pub const SETTING_CAPACITY: usize = 64;

/// Capacity of a generated MQTT topic, in bytes.
pub const TOPIC_CAPACITY: usize = 2 * SETTING_CAPACITY + DEVICE_TYPE.len() + 16;

/// A text setting.
pub type SettingString = String<SETTING_CAPACITY>;

/// An MQTT topic built from the settings.
pub type Topic = String<TOPIC_CAPACITY>;

/// Device name used when none is stored.
pub const DEFAULT_NAME: &str = "name_0";
/// Device location used when none is stored.
pub const DEFAULT_LOCATION: &str = "room_0";
/// MQTT broker used when none is stored.
pub const DEFAULT_MQTT_HOST: &str = "162.243.215.71";
/// MQTT port used when none is stored.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Identifier of a stored setting.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum ConfigId {
    /// Device name, part of the MQTT topics.
    Name = 0,
    /// Device location, part of the MQTT topics.
    Location = 1,
    /// Wi-Fi network name.
    Ssid = 2,
    /// Wi-Fi password.
    SsidPass = 3,
    /// MQTT broker host.
    MqttHost = 4,
    /// MQTT broker port.
    MqttPort = 5,
}

impl ConfigId {
    /// Every id, in storage order.
    pub const ALL: [ConfigId; 6] = [
        ConfigId::Name,
        ConfigId::Location,
        ConfigId::Ssid,
        ConfigId::SsidPass,
        ConfigId::MqttHost,
        ConfigId::MqttPort,
    ];

    /// Maps a stored item id back to a `ConfigId`.
    pub const fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(ConfigId::Name),
            1 => Some(ConfigId::Location),
            2 => Some(ConfigId::Ssid),
            3 => Some(ConfigId::SsidPass),
            4 => Some(ConfigId::MqttHost),
            5 => Some(ConfigId::MqttPort),
            _ => None,
        }
    }
}

impl From<ConfigId> for u8 {
    fn from(id: ConfigId) -> u8 {
        id as u8
    }
}

/// The device settings.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Settings {
    /// Device name.
    pub name: SettingString,
    /// Device location.
    pub location: SettingString,
    /// Wi-Fi network name.
    pub ssid: SettingString,
    /// Wi-Fi password.
    pub ssid_pass: SettingString,
    /// MQTT broker host.
    pub mqtt_host: SettingString,
    /// MQTT broker port.
    pub mqtt_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: setting(DEFAULT_NAME),
            location: setting(DEFAULT_LOCATION),
            ssid: SettingString::new(),
            ssid_pass: SettingString::new(),
            mqtt_host: setting(DEFAULT_MQTT_HOST),
            mqtt_port: DEFAULT_MQTT_PORT,
        }
    }
}

fn setting(text: &str) -> SettingString {
    SettingString::try_from(text).unwrap_or_default()
}

impl Settings {
    /// Loads the settings from `store`, falling back to the defaults for anything
    /// missing or unusable.
    pub fn load<F: Flash>(store: &mut ConfigStore<F>) -> Self {
        let read = store.read(MAX_CONFIG_ITEMS);
        let settings = Self::from_items(read.valid());
        debug!("settings: loaded {} stored values", read.count);
        settings
    }

    /// Replaces the stored image with these settings.
    pub fn save<F: Flash>(&self, store: &mut ConfigStore<F>) -> Result<(), ConfigError> {
        store.write(&self.to_items()?)
    }

    /// Builds settings from stored items, on top of the defaults.
    ///
    /// Items with an unknown id, text that is not UTF-8 or does not fit, and malformed
    /// ports are skipped with a log line.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ConfigItem>) -> Self {
        let mut settings = Self::default();
        for item in items {
            settings.apply_item(item);
        }
        settings
    }

    fn apply_item(&mut self, item: &ConfigItem) {
        let Some(id) = ConfigId::from_u8(item.id) else {
            warn!("settings: ignoring unknown item id {}", item.id);
            return;
        };
        if id == ConfigId::MqttPort {
            match parse_port(item.bytes()) {
                Some(port) => self.mqtt_port = port,
                None => warn!("settings: ignoring malformed mqtt port"),
            }
            return;
        }

        let Some(value) = parse_text(item.bytes()) else {
            warn!("settings: ignoring unusable text for item {}", item.id);
            return;
        };
        match id {
            ConfigId::Name => self.name = value,
            ConfigId::Location => self.location = value,
            ConfigId::Ssid => self.ssid = value,
            ConfigId::SsidPass => self.ssid_pass = value,
            ConfigId::MqttHost => self.mqtt_host = value,
            ConfigId::MqttPort => {}
        }
    }

    /// One item per setting, in [`ConfigId::ALL`] order.
    pub fn to_items(&self) -> Result<[ConfigItem; 6], ConfigError> {
        Ok([
            ConfigItem::new(ConfigId::Name.into(), self.name.as_bytes())?,
            ConfigItem::new(ConfigId::Location.into(), self.location.as_bytes())?,
            ConfigItem::new(ConfigId::Ssid.into(), self.ssid.as_bytes())?,
            ConfigItem::new(ConfigId::SsidPass.into(), self.ssid_pass.as_bytes())?,
            ConfigItem::new(ConfigId::MqttHost.into(), self.mqtt_host.as_bytes())?,
            ConfigItem::new(ConfigId::MqttPort.into(), &self.mqtt_port.to_le_bytes())?,
        ])
    }

    /// Topic the device listens on for commands: `/<location>/esp-gizmo-ir/<name>/cmd`.
    pub fn cmd_topic(&self) -> Topic {
        self.topic("cmd")
    }

    /// Topic the device reports on: `/<location>/esp-gizmo-ir/<name>/status`.
    pub fn status_topic(&self) -> Topic {
        self.topic("status")
    }

    fn topic(&self, leaf: &str) -> Topic {
        let mut topic = Topic::new();
        // Capacity covers the longest location and name.
        let _ = write!(topic, "/{}/{}/{}/{}", self.location, DEVICE_TYPE, self.name, leaf);
        topic
    }
}

/// Stored text may carry a C-style terminator.
fn parse_text(bytes: &[u8]) -> Option<SettingString> {
    let text = core::str::from_utf8(bytes).ok()?;
    SettingString::try_from(text.trim_end_matches('\0')).ok()
}

/// A port is either a little-endian `u16` or decimal text.
fn parse_port(bytes: &[u8]) -> Option<u16> {
    if let Ok(raw) = <[u8; 2]>::try_from(bytes) {
        return Some(u16::from_le_bytes(raw));
    }
    core::str::from_utf8(bytes)
        .ok()?
        .trim_end_matches('\0')
        .trim()
        .parse()
        .ok()
}
