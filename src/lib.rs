//! # gizmo-ir
//!
//! A portable, no_std Rust driver for remote-controlling Midea-style air conditioners over
//! infrared, together with a small flash-backed configuration store for the device settings.
//!
//! This crate implements:
//! - an encoder turning a [`DeviceState`](crate::state::DeviceState) into the 6-byte
//!   complement-checked IR frame
//! - an interrupt-driven waveform generator that modulates the frame onto a ~38 kHz carrier
//!   using only an `embedded-hal` output pin and a periodic timer
//! - a blocking waveform generator that gates a hardware PWM carrier with a delay provider
//! - a configuration store that lays out id-tagged byte blobs in raw flash with a main header,
//!   per-item headers, 4-byte alignment and per-item checksums
//! - a thin command interpreter mapping text commands (`"on"`, `"cool"`, `"temp 21"`, ...)
//!   onto the device state
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support and replaces `heapless::Vec`s with
//! `std::vec::Vec`s for configuration blobs |
//! | `delay-loop`          | Uses `embedded_hal::delay::DelayNs` for blocking transmission |
//! | `timer-isr` (default) | Uses `critical_section::with` to share the transmitter with a timer ISR |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gizmo_ir::command::Controller;
//! use gizmo_ir::transmitter::{FreeRunning, IrTransmitter};
//!
//! let transmitter = IrTransmitter::new(ir_pin, FreeRunning, 42);
//! let mut controller = Controller::new(transmitter);
//! controller.handle("temp 21");
//! controller.handle("on");
//! loop {
//!     controller.sender_mut().tick(); // Call at 2x the carrier frequency (~13.2 µs)
//! }
//! ```
//!
//! Or, with the `delay-loop` feature and a PWM channel already running at the carrier:
//!
//! ```rust,ignore
//! let mut sender = gizmo_ir::timer::BlockingSender::new(pwm, delay);
//! sender.transmit(&gizmo_ir::encoding::encode(&state));
//! ```
//!
//! ## Integration Notes
//!
//! - Protocol timing is based on a 550 µs unit; one frame plus its repeat takes ~190 ms
//! - Only one transmitter instance should be active at a time in interrupt-driven mode
//! - Flash access is blocking and must never happen from interrupt context
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

#[macro_use]
pub(crate) mod fmt;

pub(crate) mod checksum;
pub mod command;
pub mod config;
pub mod consts;
pub mod encoding;
pub mod flash;
pub mod pulse;
pub mod settings;
pub mod state;
pub mod timer;
pub mod transmitter;
