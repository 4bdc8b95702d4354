//! Timer and tick-loop utilities for the IR transmitter.
//!
//! Logic for scheduling the waveform generator. This employs two approaches: an interrupt service
//! routine using `critical_section::with` (`timer-isr` feature), or a blocking delay loop
//! (`delay-loop` feature).
//!
//! Contains helpers for delay- and ISR-based scheduling, including:
//! - `compute_timer_reload`: runtime timer reload calculator
//! - `const_timer_reload`: compile-time timer reload calculator
//! - `sub_ticks_per_slot`: ticks per protocol unit for [`IrTransmitter::new`](crate::transmitter::IrTransmitter::new)
//! - `BlockingSender` and `run_ir_tick_loop`: blocking transmission (feature `delay-loop`)
//! - `global_ir_timer_tick` and `tick_ir_timer!()`: interrupt-based tick callback wrapper
//!   (feature `timer-isr`)
//!
//! Common tick settings for a 38 kHz carrier (76 kHz interrupt):
//!
//! | F_CPU  | PRESCALER | RELOAD | Sub-ticks per 550 µs unit |
//! |--------|-----------|--------|---------------------------|
//! | 80 MHz |         1 |   1053 |                        42 |
//! | 80 MHz |        16 |     66 |                        42 |
//! | 16 MHz |         8 |     26 |                        42 |

use libm::round;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// 1,000,000 microseconds = 1 second
pub const MICROSECONDS_PER_SECOND: u64 = 1_000_000;
/// 1,000,000,000 nanoseconds = 1 second
pub const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;

/// Computes the reload value of a timer firing at `tick_hz`
///
/// # Arguments
/// - `f_cpu`: timer input clock in Hz
/// - `prescaler`: timer prescaler (e.g., 1, 8, 16)
/// - `tick_hz`: desired interrupt frequency, usually [`IR_TICK_HZ`](crate::consts::IR_TICK_HZ)
///
/// # Returns
/// - Timer counts between interrupts (rounds to nearest integer)
pub fn compute_timer_reload(f_cpu: u32, prescaler: u32, tick_hz: u32) -> u16 {
    let counts_per_second = f_cpu as f64 / prescaler as f64;
    round(counts_per_second / tick_hz as f64) as u16
}

/// Compile-time timer reload calculator
///
/// # Arguments
/// - `f_cpu`: timer input clock in Hz
/// - `prescaler`: timer prescaler (e.g., 1, 8, 16)
/// - `tick_hz`: desired interrupt frequency
///
/// # Returns
/// - Timer counts between interrupts (rounds to nearest integer)
pub const fn const_timer_reload(f_cpu: u32, prescaler: u32, tick_hz: u32) -> u16 {
    let divisor = prescaler as u64 * tick_hz as u64;
    ((f_cpu as u64 + divisor / 2) / divisor) as u16
}

/// Compute the number of ticks per protocol unit
///
/// # Arguments
/// - `unit_us`: protocol unit in microseconds, usually [`IR_UNIT_US`](crate::consts::IR_UNIT_US)
/// - `tick_hz`: interrupt frequency
///
/// # Returns
/// - Number of `tick()` calls per unit (for initializing the `IrTransmitter`)
pub const fn sub_ticks_per_slot(unit_us: u32, tick_hz: u32) -> u16 {
    let ticks = unit_us as u64 * tick_hz as u64;
    ((ticks + MICROSECONDS_PER_SECOND / 2) / MICROSECONDS_PER_SECOND) as u16
}

/// Period of a timer firing at `tick_hz`, in nanoseconds
pub const fn tick_period_ns(tick_hz: u32) -> u32 {
    (NANOSECONDS_PER_SECOND / tick_hz as u64) as u32
}
