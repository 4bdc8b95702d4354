//! Packet packing and complement framing for the IR protocol.
//!
//! This module turns a [`DeviceState`] into the 6-byte [`Frame`] that the
//! waveform generators put on the air, and provides the receiver-side check
//! used to recover a [`DataPacket`] from a frame.
//!
//! ## Packet layout
//!
//! ```text
//! byte 0: 1011 0010   magic (0xB2)
//! byte 1: ssss ffff   state (high nibble), fan (low nibble)
//! byte 2: tttt cccc   temperature offset (high nibble), command (low nibble)
//! ```
//!
//! Each byte is followed by its bitwise complement on the wire, so a receiver
//! can reject any frame where a pair does not add up to `0xFF`. Bits are sent
//! most significant first.
//!
//! ## Functions
//!
//! - [`encode`]: Converts a device state into a frame
//! - [`DataPacket::from_state`]: Clamps and packs the state fields
//! - [`DataPacket::from_frame`]: Validates a frame and unpacks it
//!
//! Encoding never fails: out-of-range temperatures are replaced by the
//! fallback temperature instead of being rejected.

use crate::consts::{
    FAN_OFF_CODE, FRAME_LEN, MODE_OFF_CODE, PACKET_LEN, PACKET_MAGIC, STATE_OFF_CODE,
    STATE_ON_CODE, TEMP_FALLBACK, TEMP_HIGH, TEMP_LOW, TEMP_OFF_CODE,
};
use crate::state::DeviceState;

/// The three data bytes of an IR command, unpacked into nibbles.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DataPacket {
    /// Fan nibble.
    pub fan: u8,
    /// On/off nibble. This is a protocol sentinel, not a copy of `enabled`.
    pub state: u8,
    /// Temperature offset from 17 °C, or the "off" sentinel.
    pub temp: u8,
    /// Mode nibble.
    pub command: u8,
}

impl DataPacket {
    /// Packs a device state, clamping every field into its nibble.
    pub fn from_state(state: &DeviceState) -> Self {
        if !state.enabled {
            return Self {
                fan: FAN_OFF_CODE,
                state: STATE_OFF_CODE,
                temp: TEMP_OFF_CODE,
                command: MODE_OFF_CODE,
            };
        }
        Self {
            fan: state.fan_level.code(),
            state: STATE_ON_CODE,
            temp: temperature_offset(state.temperature),
            command: state.mode.code(),
        }
    }

    /// The packet bytes, magic first.
    pub const fn to_bytes(&self) -> [u8; PACKET_LEN] {
        [
            PACKET_MAGIC,
            ((self.state & 0x0F) << 4) | (self.fan & 0x0F),
            ((self.temp & 0x0F) << 4) | (self.command & 0x0F),
        ]
    }

    /// Recovers a packet from a received frame.
    ///
    /// Returns `None` if any complement pair is broken or the magic byte is wrong.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.is_valid() {
            return None;
        }
        let [magic, byte1, byte2] = frame.packet_bytes();
        if magic != PACKET_MAGIC {
            return None;
        }
        Some(Self {
            fan: byte1 & 0x0F,
            state: byte1 >> 4,
            temp: byte2 >> 4,
            command: byte2 & 0x0F,
        })
    }
}

/// Offset nibble for a temperature, substituting the fallback when out of range.
pub fn temperature_offset(temperature: i32) -> u8 {
    let celsius = if (TEMP_LOW..=TEMP_HIGH).contains(&temperature) {
        temperature
    } else {
        TEMP_FALLBACK
    };
    // Range checked above, the offset is 0..=13.
    (celsius - TEMP_LOW) as u8
}

/// Six bytes as they go on the air: every packet byte followed by its complement.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Interleaves the packet bytes with their complements.
    pub fn from_packet(packet: &DataPacket) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        for (i, byte) in packet.to_bytes().into_iter().enumerate() {
            bytes[2 * i] = byte;
            bytes[2 * i + 1] = !byte;
        }
        Self(bytes)
    }

    /// Wraps received bytes without checking them; see [`Frame::is_valid`].
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw frame bytes.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// The data bytes, with the complements dropped.
    pub const fn packet_bytes(&self) -> [u8; PACKET_LEN] {
        [self.0[0], self.0[2], self.0[4]]
    }

    /// Whether every odd byte is the complement of the byte before it.
    pub fn is_valid(&self) -> bool {
        self.0.chunks(2).all(|pair| pair[1] == !pair[0])
    }

    /// Iterates the frame bits in transmission order (MSB first).
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.0
            .iter()
            .flat_map(|&byte| (0..8).rev().map(move |bit| byte & (1 << bit) != 0))
    }

    /// Number of `1` bits in the frame. Each of them needs a longer space.
    pub fn ones(&self) -> usize {
        self.0.iter().map(|byte| byte.count_ones() as usize).sum()
    }
}

/// Encodes a device state into the frame to transmit.
pub fn encode(state: &DeviceState) -> Frame {
    Frame::from_packet(&DataPacket::from_state(state))
}
