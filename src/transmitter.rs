//! Interrupt-driven IR transmitter.
//!
//! This module provides the [`IrTransmitter`] struct, which modulates a
//! [`PulseBuffer`] onto an IR LED using only an `embedded-hal` output pin and a
//! periodic timer interrupt.
//!
//! The driver operates independently of the target platform's oscillator speed,
//! provided that the [`tick()`](IrTransmitter::tick) method is called at twice the
//! carrier frequency (every ~13.2 µs for a 38 kHz carrier).
//!
//! ## Modulation
//!
//! Every protocol unit is split into `sub_ticks_per_slot` ticks. During a high
//! slot the pin is driven high on even ticks and low on odd ticks, which produces
//! the carrier; during a low slot the pin stays low.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! use gizmo_ir::transmitter::{FreeRunning, IrTransmitter};
//!
//! fn main() {
//!     # let ir_pin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//!     let mut transmitter = IrTransmitter::new(ir_pin, FreeRunning, 42);
//!
//!     loop {
//!         transmitter.tick(); // Called every ~13.2 µs by a timer interrupt
//!         # break; // For testing purposes
//!     }
//!     # transmitter.pin.done();
//! }
//! ```
//!
//! ## Design Notes
//!
//! [`send()`](IrTransmitter::send) stops the timer, rewrites the buffer, resets
//! every index and only then restarts the timer. When the transmitter lives in a
//! `critical_section::Mutex` (see [`crate::timer`]) the interrupt can never see a
//! half-built buffer.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::consts::FRAME_REPEATS;
use crate::encoding::Frame;
use crate::pulse::PulseBuffer;

/// Anything that can put an encoded frame on the air.
///
/// This is the seam between the command interpreter and the waveform generators.
pub trait FrameSender {
    /// Transmits `frame`, including its repeat.
    fn send_frame(&mut self, frame: &Frame);
}

/// Control over the periodic timer that calls [`IrTransmitter::tick`].
pub trait TickTimer {
    /// Starts (or resumes) the periodic interrupt.
    fn enable(&mut self);
    /// Stops the periodic interrupt.
    fn disable(&mut self);
}

/// A timer that is never stopped. Ticks keep arriving and are ignored while idle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FreeRunning;

impl TickTimer for FreeRunning {
    fn enable(&mut self) {}

    fn disable(&mut self) {}
}

/// State of the [`IrTransmitter`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum IrMode {
    /// Timer disabled, pin low.
    #[default]
    Idle,
    /// Timer enabled, the pulse buffer is being played.
    Emitting,
}

/// A software-modulated IR transmitter driven by a timer interrupt.
///
/// ## Type Parameters
///
/// - `TX`: A type implementing [`embedded_hal::digital::OutputPin`] wired to the IR LED
/// - `T`: A [`TickTimer`] controlling the interrupt that calls [`tick()`](#method.tick)
///
/// ## Notes
///
/// - Only one `IrTransmitter` instance should be active if you're using interrupts.
/// - `tick()` performs no allocation and no blocking call.
#[derive(Debug)]
pub struct IrTransmitter<TX, T>
where
    TX: OutputPin,
    T: TickTimer,
{
    /// The current mode of the transmitter
    pub mode: IrMode,
    /// IR LED pin
    pub pin: TX,
    /// Timer driving `tick()`
    pub timer: T,
    buffer: PulseBuffer,
    sub_ticks_per_slot: u16,

    /// Index into the pulse buffer of the slot being played.
    pub(crate) current_slot: usize,

    /// Tick within the current slot, `0..sub_ticks_per_slot`.
    pub(crate) current_sub_tick: u16,

    /// Plays of the buffer left, including the current one.
    pub(crate) repeat_count: u8,

    /// Counter of completed transmissions (frame and repeat).
    pub sent_frames: u16,
}

impl<TX, T> IrTransmitter<TX, T>
where
    TX: OutputPin,
    T: TickTimer,
{
    /// Creates a new `IrTransmitter`.
    ///
    /// # Arguments
    /// - `pin`: The output pin driving the IR LED.
    /// - `timer`: The timer calling `tick()`; it is disabled until the first `send()`.
    /// - `sub_ticks_per_slot`: `tick()` calls per protocol unit (e.g. 42 for 550 µs at 76 kHz),
    ///   see [`crate::timer::sub_ticks_per_slot`]. Values below 1 are raised to 1.
    ///
    /// # Notes
    /// The pin is driven `LOW` initially.
    pub fn new(pin: TX, timer: T, sub_ticks_per_slot: u16) -> Self {
        let mut cls = Self {
            mode: IrMode::Idle,
            pin,
            timer,
            buffer: PulseBuffer::new(),
            sub_ticks_per_slot: sub_ticks_per_slot.max(1),
            current_slot: 0,
            current_sub_tick: 0,
            repeat_count: 0,
            sent_frames: 0,
        };
        cls.timer.disable();
        cls.write_pin(false);
        cls
    }

    fn write_pin(&mut self, high: bool) {
        if high {
            let _ = self.pin.set_high();
        } else {
            let _ = self.pin.set_low();
        }
    }

    /// The pulse buffer of the last frame sent.
    pub fn buffer(&self) -> &PulseBuffer {
        &self.buffer
    }

    /// `tick()` calls per protocol unit.
    pub fn sub_ticks_per_slot(&self) -> u16 {
        self.sub_ticks_per_slot
    }

    /// Whether no transmission is in progress.
    pub fn is_idle(&self) -> bool {
        self.mode == IrMode::Idle
    }

    /// Completes once the transmitter is idle.
    pub fn wait_idle(&self) -> nb::Result<(), Infallible> {
        if self.mode == IrMode::Emitting {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Number of `tick()` calls a full transmission of `frame` takes, repeat included.
    pub fn ticks_for(&self, frame: &Frame) -> usize {
        PulseBuffer::slots_for(frame) * self.sub_ticks_per_slot as usize * FRAME_REPEATS as usize
    }

    /// Starts transmitting `frame`, aborting any transmission in progress.
    ///
    /// Stops the timer, rebuilds the pulse buffer, resets every index and the repeat
    /// counter, then restarts the timer.
    pub fn send(&mut self, frame: &Frame) {
        self.timer.disable();
        self.mode = IrMode::Idle;

        self.buffer.rebuild(frame);
        self.current_slot = 0;
        self.current_sub_tick = 0;
        self.repeat_count = FRAME_REPEATS;

        trace!("ir: sending {} slots", self.buffer.len());
        self.mode = IrMode::Emitting;
        self.timer.enable();
    }

    /// Advances the modulation by one timer tick.
    ///
    /// Must be called at twice the carrier frequency while the transmitter is emitting.
    /// Does nothing while idle.
    pub fn tick(&mut self) {
        if self.mode != IrMode::Emitting {
            return;
        }

        if self.current_sub_tick < self.sub_ticks_per_slot {
            let high = self.current_sub_tick % 2 == 0 && self.buffer.is_high(self.current_slot);
            self.write_pin(high);
            self.current_sub_tick += 1;
        }

        if self.current_sub_tick >= self.sub_ticks_per_slot {
            self.current_sub_tick = 0;
            self.current_slot += 1;
            if self.current_slot >= self.buffer.len() {
                self.current_slot = 0;
                self.repeat_count = self.repeat_count.saturating_sub(1);
                if self.repeat_count == 0 {
                    self.finish();
                }
            }
        }
    }

    fn finish(&mut self) {
        self.timer.disable();
        self.write_pin(false);
        self.mode = IrMode::Idle;
        self.sent_frames = self.sent_frames.wrapping_add(1);
        debug!("ir: transmission {} complete", self.sent_frames);
    }
}

impl<TX, T> FrameSender for IrTransmitter<TX, T>
where
    TX: OutputPin,
    T: TickTimer,
{
    fn send_frame(&mut self, frame: &Frame) {
        self.send(frame);
    }
}
