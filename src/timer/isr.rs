use crate::encoding::Frame;
use crate::transmitter::{FrameSender, IrTransmitter, TickTimer};
use core::cell::RefCell;
use core::fmt;
use critical_section::Mutex;
use embedded_hal::digital::OutputPin;

/// A global `IrTransmitter` slot shared between the main program and the timer ISR.
pub type GlobalIrTransmitter<TX, T> = Mutex<RefCell<Option<IrTransmitter<TX, T>>>>;

/// Used to initialize the global static `IrTransmitter` for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust,ignore
/// use gizmo_ir::timer::{global_ir_transmitter_init, GlobalIrTransmitter};
/// use some_hal::{Gpio14, Timer1};
///
/// static IR: GlobalIrTransmitter<Gpio14, Timer1> = global_ir_transmitter_init();
/// ```
pub const fn global_ir_transmitter_init<TX: OutputPin, T: TickTimer>()
-> GlobalIrTransmitter<TX, T> {
    Mutex::new(RefCell::new(None))
}

/// Installs a new `IrTransmitter` in the global slot.
///
/// # Arguments
/// * The global static `IrTransmitter`
/// * The IR LED pin
/// * The timer calling the ISR
/// * The number of ticks per protocol unit such that
///   `interrupt frequency * unit = ticks per unit`, e.g. 42 for a 76 kHz interrupt and a
///   550 µs unit (see [`sub_ticks_per_slot`](crate::timer::sub_ticks_per_slot))
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     global_ir_transmitter_setup(&IR, pin, timer, 42);
/// }
/// ```
pub fn global_ir_transmitter_setup<TX: OutputPin, T: TickTimer>(
    global: &'static GlobalIrTransmitter<TX, T>,
    pin: TX,
    timer: T,
    sub_ticks_per_slot: u16,
) {
    critical_section::with(|cs| {
        let _ = global
            .borrow(cs)
            .replace(Some(IrTransmitter::new(pin, timer, sub_ticks_per_slot)));
    });
}

/// Runs the tick at each interrupt
///
/// # Arguments
/// * The global static `IrTransmitter`
///# Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     global_ir_timer_tick(&IR);
/// }
/// ```
pub fn global_ir_timer_tick<TX: OutputPin, T: TickTimer>(
    global: &'static GlobalIrTransmitter<TX, T>,
) {
    critical_section::with(|cs| {
        if let Some(transmitter) = global.borrow(cs).borrow_mut().as_mut() {
            transmitter.tick();
        }
    });
}

/// Starts sending `frame` through the global transmitter.
///
/// The buffer rebuild happens inside a critical section, so the ISR never observes it
/// half done. Does nothing if the transmitter has not been set up.
pub fn global_ir_send<TX: OutputPin, T: TickTimer>(
    global: &'static GlobalIrTransmitter<TX, T>,
    frame: &Frame,
) {
    critical_section::with(|cs| {
        if let Some(transmitter) = global.borrow(cs).borrow_mut().as_mut() {
            transmitter.send(frame);
        }
    });
}

/// A [`FrameSender`] handle to a global `IrTransmitter`.
///
/// Lets a [`Controller`](crate::command::Controller) running in task context drive a
/// transmitter owned by the ISR.
pub struct GlobalSender<TX: OutputPin + 'static, T: TickTimer + 'static> {
    global: &'static GlobalIrTransmitter<TX, T>,
}

impl<TX: OutputPin + 'static, T: TickTimer + 'static> GlobalSender<TX, T> {
    /// Wraps the global slot.
    pub const fn new(global: &'static GlobalIrTransmitter<TX, T>) -> Self {
        Self { global }
    }

    /// Whether the global transmitter is missing or idle.
    pub fn is_idle(&self) -> bool {
        critical_section::with(|cs| {
            self.global
                .borrow(cs)
                .borrow()
                .as_ref()
                .is_none_or(IrTransmitter::is_idle)
        })
    }
}

impl<TX: OutputPin + 'static, T: TickTimer + 'static> FrameSender for GlobalSender<TX, T> {
    fn send_frame(&mut self, frame: &Frame) {
        global_ir_send(self.global, frame);
    }
}

impl<TX: OutputPin + 'static, T: TickTimer + 'static> fmt::Debug for GlobalSender<TX, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalSender").finish_non_exhaustive()
    }
}
