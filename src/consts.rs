//! Constants used across the IR protocol and the configuration store.
//!
//! This module defines the protocol-wide constants used for packet packing,
//! pulse timing, carrier generation, buffer sizing and flash layout.
//!
//! The protocol values follow the Midea air conditioner remote convention:
//! three data bytes, each followed by its bitwise complement, sent twice.
//!
//! ## Key Concepts
//!
//! - **Packet**: `[magic] [state | fan] [temp | command]`, high nibble first.
//! - **Unit (T)**: the shortest pulse; every other duration is a multiple of it.
//! - **Carrier**: the modulation under each mark, required by IR receivers.
//! - **Flash image**: a main header followed by id-tagged, 4-byte aligned blobs.
//!
//! These values should be used wherever framing, timing or flash layout logic
//! is implemented to keep the transmitter, encoder and store consistent.

/// Constant first byte of every packet, used by the receiver as a pattern anchor.
pub const PACKET_MAGIC: u8 = 0xB2;

/// Number of data bytes in a packet.
pub const PACKET_LEN: usize = 3;

/// Number of bytes in a frame: every packet byte followed by its complement.
pub const FRAME_LEN: usize = PACKET_LEN * 2;

/// Number of bits carried by one frame.
pub const FRAME_BITS: usize = FRAME_LEN * 8;

/// Fan nibble for the low speed.
pub const FAN_LOW_CODE: u8 = 0b1001;
/// Fan nibble for the medium speed.
pub const FAN_MEDIUM_CODE: u8 = 0b0101;
/// Fan nibble for the high speed.
pub const FAN_HIGH_CODE: u8 = 0b0011;
/// Fan nibble for the automatic speed.
pub const FAN_AUTO_CODE: u8 = 0b1011;
/// Fan nibble when the fan is off, also sent for every "power off" packet.
pub const FAN_OFF_CODE: u8 = 0b1110;

/// State nibble for a unit that should be running.
pub const STATE_ON_CODE: u8 = 0b1011;
/// State nibble for a unit that should be switched off.
pub const STATE_OFF_CODE: u8 = 0b1111;

/// Command nibble for the automatic mode.
pub const MODE_AUTO_CODE: u8 = 0b1000;
/// Command nibble for cooling.
pub const MODE_COOL_CODE: u8 = 0b0000;
/// Command nibble for heating.
pub const MODE_HEAT_CODE: u8 = 0b1100;
/// Command nibble for fan-only operation.
pub const MODE_FAN_CODE: u8 = 0b0100;
/// Command nibble for dehumidifying.
pub const MODE_DRY_CODE: u8 = 0b1101;
/// Command nibble sent with a "power off" packet.
pub const MODE_OFF_CODE: u8 = 0b0000;

/// Lowest temperature the unit accepts, in °C. Encoded as offset `0`.
pub const TEMP_LOW: i32 = 17;
/// Highest temperature the unit accepts, in °C. Encoded as offset `13`.
pub const TEMP_HIGH: i32 = 30;
/// Temperature encoded whenever the requested one is out of range, in °C.
pub const TEMP_FALLBACK: i32 = 24;
/// Temperature nibble sent with a "power off" packet.
pub const TEMP_OFF_CODE: u8 = 0b1110;

/// Protocol unit `T` in microseconds.
pub const IR_UNIT_US: u32 = 550;
/// Length of the start mark, in units.
pub const START_MARK_UNITS: usize = 8;
/// Length of the start space, in units.
pub const START_SPACE_UNITS: usize = 8;
/// Length of every bit mark, in units.
pub const BIT_MARK_UNITS: usize = 1;
/// Length of the space following a `0` bit, in units.
pub const ZERO_SPACE_UNITS: usize = 1;
/// Length of the space following a `1` bit, in units.
pub const ONE_SPACE_UNITS: usize = 3;
/// Length of the stop mark, in units.
pub const STOP_MARK_UNITS: usize = 1;
/// Silence after the stop mark, in units. Approximates [`FRAME_GAP_US`] on the unit grid.
pub const STOP_GAP_UNITS: usize = 10;
/// Silence between the first frame and its repeat in the blocking sender, in microseconds.
pub const FRAME_GAP_US: u32 = 5_200;
/// Number of times each frame is sent.
pub const FRAME_REPEATS: u8 = 2;

/// Capacity of the pulse buffer: a frame of all `1` bits, plus start and stop conditions.
pub const PULSE_BUFFER_CAPACITY: usize = START_MARK_UNITS
    + START_SPACE_UNITS
    + FRAME_BITS * (BIT_MARK_UNITS + ONE_SPACE_UNITS)
    + STOP_MARK_UNITS
    + STOP_GAP_UNITS;

/// Carrier frequency of the interrupt-driven transmitter, in hertz.
pub const IR_CARRIER_HZ: u32 = 38_000;
/// Timer interrupt frequency of the interrupt-driven transmitter: one tick per carrier half period.
pub const IR_TICK_HZ: u32 = IR_CARRIER_HZ * 2;
/// Carrier frequency the PWM channel should be configured with for the blocking sender, in hertz.
pub const PWM_CARRIER_HZ: u32 = 46_000;
/// PWM duty cycle used for a mark, in percent.
pub const PWM_DUTY_PERCENT: u8 = 50;

/// Flash address of the configuration image.
pub const CONFIG_FLASH_BASE_ADDR: u32 = 0xE0000;
/// Size of the flash erase unit, in bytes.
pub const FLASH_SECTOR_SIZE: u32 = 0x1000;
/// Signature of a written configuration image.
pub const CONFIG_SIGNATURE: u16 = 0xAA55;
/// Size of the main header: signature + total length.
pub const MAIN_HEADER_LEN: usize = 4;
/// Size of an item header: id + length + checksum.
pub const DATA_HEADER_LEN: usize = 4;
/// Flash reads and writes must use addresses and sizes that are a multiple of this.
pub const FLASH_ALIGNMENT: usize = 4;
/// Largest blob a single configuration item can hold.
pub const MAX_ITEM_LEN: usize = u8::MAX as usize;
/// Largest number of items read or written at once.
pub const MAX_CONFIG_ITEMS: usize = 8;
/// Attempts made for each flash primitive before giving up.
pub const FLASH_RETRIES: u8 = 3;

/// Device type used in the messaging topics.
pub const DEVICE_TYPE: &str = "esp-gizmo-ir";
