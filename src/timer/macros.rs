/// Declares a static global `IR_TRANSMITTER` instance protected by a `critical_section` mutex.
///
/// This macro creates a `static` singleton `IR_TRANSMITTER` suitable for use in
/// interrupt-based environments, where both the main thread and an ISR need
/// to safely access the shared transmitter state.
///
/// # Arguments
/// - `$tx`: The concrete type of the IR LED pin (must implement `OutputPin`)
/// - `$timer`: The concrete type of the tick timer (must implement `TickTimer`)
///
/// # Example
/// ```rust,ignore
/// init_ir_transmitter!(MyPinType, MyTimerType);
/// ```
#[macro_export]
macro_rules! init_ir_transmitter {
    ( $tx:ty, $timer:ty ) => {
        pub static IR_TRANSMITTER: $crate::timer::GlobalIrTransmitter<$tx, $timer> =
            $crate::timer::global_ir_transmitter_init::<$tx, $timer>();
    };
}

/// Initializes the global `IR_TRANSMITTER` singleton with a new transmitter instance.
///
/// This macro wraps construction of the `IrTransmitter` and stores it inside the
/// globally declared `IR_TRANSMITTER` created by `init_ir_transmitter!`.
///
/// # Arguments
/// - `$tx`: The IR LED pin (must implement `OutputPin`)
/// - `$timer`: The tick timer (must implement `TickTimer`)
/// - `$sub_ticks`: Ticks per protocol unit (e.g., 42 for 550 µs at 76 kHz)
///
/// # Example
/// ```rust,ignore
/// main() {
///     setup_ir_transmitter!(pin, timer, 42);
/// }
/// ```
///
/// # Notes
/// - Must be called inside a critical section-aware context (safe in `main()`).
/// - Requires `init_ir_transmitter!` to have been used earlier.
#[macro_export]
macro_rules! setup_ir_transmitter {
    ( $tx:expr, $timer:expr, $sub_ticks:expr ) => {
        $crate::timer::global_ir_transmitter_setup(&IR_TRANSMITTER, $tx, $timer, $sub_ticks)
    };
}

/// Calls `tick()` on the global `IR_TRANSMITTER` if it has been initialized.
///
/// This macro is intended to be invoked from a timer ISR firing at twice the
/// carrier frequency (e.g., every 13.2 µs for 38 kHz).
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     tick_ir_timer!();
/// }
/// ```
///
/// # Notes
/// - This macro assumes `IR_TRANSMITTER` was declared with `init_ir_transmitter!`
///   and initialized via `setup_ir_transmitter!`.
/// - Safe to call repeatedly; does nothing if the transmitter hasn't been set up yet.
#[macro_export]
macro_rules! tick_ir_timer {
    () => {
        $crate::timer::global_ir_timer_tick(&IR_TRANSMITTER)
    };
}

/// Starts sending a frame through the global `IR_TRANSMITTER`.
///
/// # Example
/// ```rust,ignore
/// send_ir_frame!(&gizmo_ir::encoding::encode(&state));
/// ```
#[macro_export]
macro_rules! send_ir_frame {
    ( $frame:expr ) => {
        $crate::timer::global_ir_send(&IR_TRANSMITTER, $frame)
    };
}

#[cfg(test)]
mod tests {
    use crate::encoding::encode;
    use crate::state::{DeviceState, Mode};
    use crate::transmitter::TickTimer;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, OutputPin};

    #[derive(Debug, Default)]
    struct NullPin;

    impl ErrorType for NullPin {
        type Error = Infallible;
    }

    impl OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingTimer {
        enabled: bool,
        starts: u8,
    }

    impl TickTimer for CountingTimer {
        fn enable(&mut self) {
            self.enabled = true;
            self.starts += 1;
        }

        fn disable(&mut self) {
            self.enabled = false;
        }
    }

    init_ir_transmitter!(NullPin, CountingTimer);

    #[test]
    fn test_macros_drive_global_transmitter() {
        setup_ir_transmitter!(NullPin, CountingTimer::default(), 2);
        let frame = encode(&DeviceState {
            enabled: true,
            mode: Mode::Heat,
            ..DeviceState::default()
        });
        send_ir_frame!(&frame);

        let ticks = critical_section::with(|cs| {
            let slot = IR_TRANSMITTER.borrow(cs).borrow();
            let transmitter = slot.as_ref().unwrap();
            assert!(transmitter.timer.enabled);
            transmitter.ticks_for(&frame)
        });
        for _ in 0..ticks {
            tick_ir_timer!();
        }

        critical_section::with(|cs| {
            let slot = IR_TRANSMITTER.borrow(cs).borrow();
            let transmitter = slot.as_ref().unwrap();
            assert!(transmitter.is_idle());
            assert!(!transmitter.timer.enabled);
            assert_eq!(transmitter.timer.starts, 1);
            assert_eq!(transmitter.sent_frames, 1);
        });
    }
}
