use crate::consts::{
    BIT_MARK_UNITS, FRAME_GAP_US, IR_UNIT_US, ONE_SPACE_UNITS, PWM_DUTY_PERCENT, START_MARK_UNITS,
    START_SPACE_UNITS, STOP_MARK_UNITS, ZERO_SPACE_UNITS,
};
use crate::encoding::Frame;
use crate::transmitter::{FrameSender, IrTransmitter, TickTimer};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

/// Runs a blocking loop that calls `tick()` on the provided transmitter until it goes idle.
///
/// This is a simple timing loop for use in environments where interrupts are unavailable
/// or undesired. It drives the transmitter's modulation using a delay provider implementing
/// `embedded_hal::delay::DelayNs`.
///
/// # Arguments
/// - `transmitter`: An `IrTransmitter` that has just been handed a frame with `send()`.
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
/// - `tick_ns`: The delay between each tick call, in nanoseconds
///   (see [`tick_period_ns`](crate::timer::tick_period_ns), 13157 for 76 kHz).
///
/// # Example
/// ```rust,ignore
/// use gizmo_ir::timer::{run_ir_tick_loop, tick_period_ns};
/// let mut transmitter = IrTransmitter::new(pin, FreeRunning, 42);
/// transmitter.send(&frame);
/// run_ir_tick_loop(&mut transmitter, &mut delay, tick_period_ns(IR_TICK_HZ));
/// ```
///
/// # Notes
/// - Returns immediately if nothing is being sent.
/// - The time spent in `tick()` adds to every period; the carrier drifts low on slow cores.
pub fn run_ir_tick_loop<D: DelayNs, TX, T>(
    transmitter: &mut IrTransmitter<TX, T>,
    delay: &mut D,
    tick_ns: u32,
) where
    TX: OutputPin,
    T: TickTimer,
{
    loop {
        match transmitter.wait_idle() {
            Ok(()) => return,
            Err(nb::Error::WouldBlock) => {
                transmitter.tick();
                delay.delay_ns(tick_ns);
            }
            Err(nb::Error::Other(never)) => match never {},
        }
    }
}

/// Blocking IR sender gating a hardware PWM carrier with a delay provider.
///
/// The PWM channel is expected to run at
/// [`PWM_CARRIER_HZ`](crate::consts::PWM_CARRIER_HZ); a mark sets it to
/// [`PWM_DUTY_PERCENT`] duty and a space turns it fully off.
///
/// [`transmit()`](Self::transmit) occupies the caller for the whole frame and its
/// repeat (about 180 ms) and cannot be cancelled.
#[derive(Debug)]
pub struct BlockingSender<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    pwm: P,
    delay: D,
}

impl<P, D> BlockingSender<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    /// Wraps a PWM channel and a delay provider. The carrier is switched off.
    pub fn new(pwm: P, delay: D) -> Self {
        let mut cls = Self { pwm, delay };
        let _ = cls.pwm.set_duty_cycle_fully_off();
        cls
    }

    /// Gives back the PWM channel and the delay provider.
    pub fn release(self) -> (P, D) {
        (self.pwm, self.delay)
    }

    /// Sends `frame`, a fixed gap, and `frame` again.
    pub fn transmit(&mut self, frame: &Frame) {
        self.mark(units(START_MARK_UNITS));
        self.space(units(START_SPACE_UNITS));
        self.bits(frame);
        self.mark(units(STOP_MARK_UNITS));

        // Gap, then a second start condition.
        self.space(FRAME_GAP_US);
        self.mark(units(START_MARK_UNITS));
        self.space(units(START_SPACE_UNITS));
        self.bits(frame);
        self.mark(units(STOP_MARK_UNITS));

        let _ = self.pwm.set_duty_cycle_fully_off();
        trace!("ir: blocking transmission complete");
    }

    fn bits(&mut self, frame: &Frame) {
        for bit in frame.bits() {
            self.mark(units(BIT_MARK_UNITS));
            self.space(units(if bit { ONE_SPACE_UNITS } else { ZERO_SPACE_UNITS }));
        }
    }

    fn mark(&mut self, us: u32) {
        let _ = self.pwm.set_duty_cycle_percent(PWM_DUTY_PERCENT);
        self.delay.delay_us(us);
    }

    fn space(&mut self, us: u32) {
        let _ = self.pwm.set_duty_cycle_fully_off();
        self.delay.delay_us(us);
    }
}

impl<P, D> FrameSender for BlockingSender<P, D>
where
    P: SetDutyCycle,
    D: DelayNs,
{
    fn send_frame(&mut self, frame: &Frame) {
        self.transmit(frame);
    }
}

const fn units(count: usize) -> u32 {
    count as u32 * IR_UNIT_US
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode;
    use crate::state::{DeviceState, FanLevel, Mode};
    use crate::transmitter::FreeRunning;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::pwm::ErrorType as PwmErrorType;
    use std::rc::Rc;

    /// Carrier level and elapsed time of every delay, in order.
    type Timeline = Rc<RefCell<Vec<(bool, u32)>>>;

    struct RecordingPwm {
        duty: Rc<RefCell<u16>>,
    }

    impl PwmErrorType for RecordingPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for RecordingPwm {
        fn max_duty_cycle(&self) -> u16 {
            100
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            *self.duty.borrow_mut() = duty;
            Ok(())
        }
    }

    struct RecordingDelay {
        duty: Rc<RefCell<u16>>,
        timeline: Timeline,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            let on = *self.duty.borrow() > 0;
            self.timeline.borrow_mut().push((on, ns / 1_000));
        }
    }

    fn sender() -> (BlockingSender<RecordingPwm, RecordingDelay>, Timeline) {
        let duty = Rc::new(RefCell::new(0));
        let timeline = Timeline::default();
        let pwm = RecordingPwm { duty: duty.clone() };
        let delay = RecordingDelay {
            duty,
            timeline: timeline.clone(),
        };
        (BlockingSender::new(pwm, delay), timeline)
    }

    fn frame() -> Frame {
        encode(&DeviceState {
            enabled: true,
            mode: Mode::Cool,
            temperature: 22,
            fan_level: FanLevel::High,
        })
    }

    #[test]
    fn test_start_condition_and_first_bit() {
        let (mut sender, timeline) = sender();
        sender.transmit(&frame());
        let timeline = timeline.borrow();
        assert_eq!(timeline[0], (true, 4_400));
        assert_eq!(timeline[1], (false, 4_400));
        // Magic byte 0xB2 starts with a `1`.
        assert_eq!(timeline[2], (true, 550));
        assert_eq!(timeline[3], (false, 1_650));
        assert_eq!(timeline[4], (true, 550));
        assert_eq!(timeline[5], (false, 550));
    }

    #[test]
    fn test_total_duration() {
        let (mut sender, timeline) = sender();
        let frame = frame();
        sender.transmit(&frame);

        let ones = frame.ones() as u32;
        let bits = 48 * 2 * 550 + ones * 2 * 550;
        let one_pass = 8 * 550 + 8 * 550 + bits + 550;
        let expected = 2 * one_pass + FRAME_GAP_US;

        let timeline = timeline.borrow();
        let total: u32 = timeline.iter().map(|&(_, us)| us).sum();
        assert_eq!(total, expected);

        let on: u32 = timeline.iter().filter(|&&(on, _)| on).map(|&(_, us)| us).sum();
        assert_eq!(on, 2 * (8 * 550 + 48 * 550 + 550));
    }

    #[test]
    fn test_gap_between_repeats() {
        let (mut sender, timeline) = sender();
        sender.transmit(&frame());
        let timeline = timeline.borrow();
        let gap = timeline
            .iter()
            .position(|&entry| entry == (false, FRAME_GAP_US))
            .unwrap();
        // Start (2) + 48 bits (96) + stop mark (1).
        assert_eq!(gap, 99);
        assert_eq!(timeline[gap - 1], (true, 550));
        assert_eq!(timeline[gap + 1], (true, 4_400));
        assert_eq!(timeline[gap + 2], (false, 4_400));
        assert_eq!(timeline.len(), 2 * 99 + 1);
    }

    #[test]
    fn test_carrier_off_after_transmit() {
        let (mut sender, _timeline) = sender();
        sender.send_frame(&frame());
        let (pwm, _delay) = sender.release();
        assert_eq!(*pwm.duty.borrow(), 0);
    }

    #[derive(Default)]
    struct CountingPin {
        rising: u32,
        high: bool,
    }

    impl PinErrorType for CountingPin {
        type Error = Infallible;
    }

    impl OutputPin for CountingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if !self.high {
                self.rising += 1;
            }
            self.high = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        calls: usize,
        elapsed_ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.calls += 1;
            self.elapsed_ns += u64::from(ns);
        }
    }

    #[test]
    fn test_tick_loop_runs_until_idle() {
        let frame = frame();
        let mut transmitter = IrTransmitter::new(CountingPin::default(), FreeRunning, 4);
        let mut delay = CountingDelay::default();

        // Nothing queued: returns at once.
        run_ir_tick_loop(&mut transmitter, &mut delay, 1_000);
        assert_eq!(delay.calls, 0);

        transmitter.send(&frame);
        run_ir_tick_loop(&mut transmitter, &mut delay, 1_000);
        assert!(transmitter.is_idle());
        assert_eq!(delay.calls, transmitter.ticks_for(&frame));
        assert_eq!(delay.elapsed_ns, transmitter.ticks_for(&frame) as u64 * 1_000);
        assert_eq!(transmitter.sent_frames, 1);
        assert!(!transmitter.pin.high);
    }
}
