//! Unit-slot representation of an IR frame.
//!
//! A [`PulseBuffer`] holds one output level per protocol unit `T`:
//!
//! | Part            | Slots                                   |
//! |-----------------|-----------------------------------------|
//! | start condition | 8 high, 8 low                           |
//! | bit `0`         | 1 high, 1 low                           |
//! | bit `1`         | 1 high, 3 low                           |
//! | stop marker     | 1 high, then the inter-frame gap (low)  |
//!
//! The capacity is fixed at [`PULSE_BUFFER_CAPACITY`]; the buffer is rebuilt
//! in place for every transmission.

use heapless::Vec;

use crate::consts::{
    BIT_MARK_UNITS, FRAME_BITS, ONE_SPACE_UNITS, PULSE_BUFFER_CAPACITY, START_MARK_UNITS,
    START_SPACE_UNITS, STOP_GAP_UNITS, STOP_MARK_UNITS, ZERO_SPACE_UNITS,
};
use crate::encoding::Frame;

/// Output levels of one frame, one entry per protocol unit.
#[derive(Debug, Clone, Default)]
pub struct PulseBuffer {
    slots: Vec<bool, PULSE_BUFFER_CAPACITY>,
}

impl PulseBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Replaces the contents with the pulse train of `frame`.
    pub fn rebuild(&mut self, frame: &Frame) {
        self.slots.clear();
        self.level(true, START_MARK_UNITS);
        self.level(false, START_SPACE_UNITS);
        for bit in frame.bits() {
            self.level(true, BIT_MARK_UNITS);
            self.level(false, if bit { ONE_SPACE_UNITS } else { ZERO_SPACE_UNITS });
        }
        self.level(true, STOP_MARK_UNITS);
        self.level(false, STOP_GAP_UNITS);
    }

    fn level(&mut self, high: bool, units: usize) {
        for _ in 0..units {
            // Capacity covers a frame of all `1` bits.
            let _ = self.slots.push(high);
        }
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the buffer holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Output level of slot `index`; `false` past the end.
    #[inline]
    pub fn is_high(&self, index: usize) -> bool {
        self.slots.get(index).copied().unwrap_or(false)
    }

    /// The slots in order.
    pub fn slots(&self) -> &[bool] {
        &self.slots
    }

    /// Number of slots the pulse train of `frame` occupies.
    pub fn slots_for(frame: &Frame) -> usize {
        let ones = frame.ones();
        START_MARK_UNITS
            + START_SPACE_UNITS
            + FRAME_BITS * (BIT_MARK_UNITS + ZERO_SPACE_UNITS)
            + ones * (ONE_SPACE_UNITS - ZERO_SPACE_UNITS)
            + STOP_MARK_UNITS
            + STOP_GAP_UNITS
    }
}
