//! Text command interpreter.
//!
//! Commands arrive as short text messages (from MQTT, HTTP, a serial console, ...).
//! [`Command::parse`] turns them into a tagged [`Command`]; a [`Controller`] applies it
//! to the [`DeviceState`] it owns and pushes the freshly encoded frame to its
//! [`FrameSender`].
//!
//! ## Grammar
//!
//! | Text              | Effect                                   |
//! |-------------------|------------------------------------------|
//! | `on` / `off`      | Power the unit on or off                 |
//! | `auto`            | Mode [`Mode::Auto`]                      |
//! | `cool`            | Mode [`Mode::Cool`]                      |
//! | `heat`            | Mode [`Mode::Heat`]                      |
//! | `fan`             | Mode [`Mode::Fan`]                       |
//! | `dry`             | Mode [`Mode::Dry`]                       |
//! | `temp <int>`      | Target temperature in °C                 |
//! | `fan_level <0-4>` | 0 auto, 1 low, 2 medium, 3 high, 4 off   |
//! | `move`            | Deflector motion, accepted and ignored   |
//!
//! Keywords are ASCII case-insensitive and surrounding whitespace is ignored.
//! Anything else is [`Command::Unrecognized`].

use crate::encoding::{Frame, encode};
use crate::state::{DeviceState, FanLevel, Mode};
use crate::transmitter::FrameSender;

/// A parsed command.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// Power on.
    On,
    /// Power off.
    Off,
    /// Switch the operating mode.
    Mode(Mode),
    /// Set the target temperature. Stored as given; the encoder clamps it.
    Temperature(i32),
    /// Set the fan speed.
    FanLevel(FanLevel),
    /// Move the air deflector. Not supported by the protocol encoder.
    Move,
    /// Text that does not match the grammar.
    Unrecognized,
}

impl Command {
    /// Parses one command message.
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let (Some(keyword), argument) = (words.next(), words.next()) else {
            return Command::Unrecognized;
        };
        if words.next().is_some() {
            return Command::Unrecognized;
        }

        let is = |name: &str| keyword.eq_ignore_ascii_case(name);
        match argument {
            None if is("on") => Command::On,
            None if is("off") => Command::Off,
            None if is("auto") => Command::Mode(Mode::Auto),
            None if is("cool") => Command::Mode(Mode::Cool),
            None if is("heat") => Command::Mode(Mode::Heat),
            None if is("fan") => Command::Mode(Mode::Fan),
            None if is("dry") => Command::Mode(Mode::Dry),
            None if is("move") => Command::Move,
            Some(value) if is("temp") => value
                .parse()
                .map(Command::Temperature)
                .unwrap_or(Command::Unrecognized),
            Some(value) if is("fan_level") => value
                .parse()
                .ok()
                .and_then(FanLevel::from_index)
                .map(Command::FanLevel)
                .unwrap_or(Command::Unrecognized),
            _ => Command::Unrecognized,
        }
    }

    /// Whether applying the command changes the device state.
    pub fn mutates_state(self) -> bool {
        !matches!(self, Command::Move | Command::Unrecognized)
    }
}

/// Owns the [`DeviceState`] and the sender it is transmitted through.
///
/// Every state-mutating command re-encodes the whole state and sends it; the
/// protocol carries no deltas.
#[derive(Debug)]
pub struct Controller<S: FrameSender> {
    state: DeviceState,
    sender: S,
}

impl<S: FrameSender> Controller<S> {
    /// Creates a controller with [`DeviceState::default()`]. Nothing is sent.
    pub fn new(sender: S) -> Self {
        Self::with_state(sender, DeviceState::default())
    }

    /// Creates a controller starting from `state`. Nothing is sent.
    pub fn with_state(sender: S, state: DeviceState) -> Self {
        Self { state, sender }
    }

    /// The current device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// The sender frames go through.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Mutable access to the sender, e.g. to tick an [`IrTransmitter`](crate::transmitter::IrTransmitter).
    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    /// Gives back the sender.
    pub fn release(self) -> S {
        self.sender
    }

    /// Parses and applies one command message, returning what was understood.
    pub fn handle(&mut self, text: &str) -> Command {
        let command = Command::parse(text);
        let _ = self.apply(command);
        command
    }

    /// Applies `command`. Returns `true` if a frame was sent.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::On => self.state.enabled = true,
            Command::Off => self.state.enabled = false,
            Command::Mode(mode) => self.state.mode = mode,
            Command::Temperature(temperature) => self.state.temperature = temperature,
            Command::FanLevel(level) => self.state.fan_level = level,
            Command::Move => {
                debug!("command: deflector motion is not supported");
                return false;
            }
            Command::Unrecognized => {
                warn!("command: unrecognized command ignored");
                return false;
            }
        }
        let _ = self.send_current();
        true
    }

    /// Encodes the current state and sends it. Returns the frame.
    pub fn send_current(&mut self) -> Frame {
        let frame = encode(&self.state);
        trace!(
            "command: sending state enabled={} temp={}",
            self.state.enabled,
            self.state.temperature
        );
        self.sender.send_frame(&frame);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{MODE_COOL_CODE, STATE_ON_CODE};
    use crate::encoding::DataPacket;
    use crate::transmitter::{FreeRunning, IrTransmitter};
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction};

    #[derive(Debug, Default)]
    struct RecordingSender {
        frames: Vec<Frame>,
    }

    impl FrameSender for RecordingSender {
        fn send_frame(&mut self, frame: &Frame) {
            self.frames.push(*frame);
        }
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Command::parse("on"), Command::On);
        assert_eq!(Command::parse("OFF"), Command::Off);
        assert_eq!(Command::parse("  Cool\r\n"), Command::Mode(Mode::Cool));
        assert_eq!(Command::parse("auto"), Command::Mode(Mode::Auto));
        assert_eq!(Command::parse("heat"), Command::Mode(Mode::Heat));
        assert_eq!(Command::parse("fan"), Command::Mode(Mode::Fan));
        assert_eq!(Command::parse("dry"), Command::Mode(Mode::Dry));
        assert_eq!(Command::parse("move"), Command::Move);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(Command::parse("temp 21"), Command::Temperature(21));
        assert_eq!(Command::parse("TEMP   -5"), Command::Temperature(-5));
        assert_eq!(Command::parse("fan_level 0"), Command::FanLevel(FanLevel::Auto));
        assert_eq!(Command::parse("fan_level 3"), Command::FanLevel(FanLevel::High));
        assert_eq!(Command::parse("fan_level 4"), Command::FanLevel(FanLevel::Off));
    }

    #[test]
    fn test_parse_rejects() {
        for text in [
            "",
            "   ",
            "toggle",
            "temp",
            "temp warm",
            "temp 21 22",
            "fan_level 5",
            "fan_level -1",
            "on now",
            "cool 20",
        ] {
            assert_eq!(Command::parse(text), Command::Unrecognized, "{text:?}");
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut controller = Controller::new(RecordingSender::default());
        assert_eq!(controller.handle("temp 19"), Command::Temperature(19));
        assert_eq!(controller.handle("on"), Command::On);
        assert_eq!(controller.handle("cool"), Command::Mode(Mode::Cool));

        let frames = &controller.sender().frames;
        assert_eq!(frames.len(), 3);
        let packet = DataPacket::from_frame(frames.last().unwrap()).unwrap();
        assert_eq!(packet.temp, 2);
        assert_eq!(packet.command, MODE_COOL_CODE);
        assert_eq!(packet.state, STATE_ON_CODE);
    }

    #[test]
    fn test_non_mutating_commands_do_not_send() {
        let mut controller = Controller::new(RecordingSender::default());
        assert_eq!(controller.handle("move"), Command::Move);
        assert_eq!(controller.handle("jump"), Command::Unrecognized);
        assert!(!controller.apply(Command::Move));
        assert!(controller.sender().frames.is_empty());
        assert_eq!(*controller.state(), DeviceState::default());
    }

    #[test]
    fn test_state_updates() {
        let mut controller = Controller::new(RecordingSender::default());
        assert!(controller.apply(Command::FanLevel(FanLevel::Medium)));
        assert!(controller.apply(Command::Temperature(40)));
        assert!(controller.apply(Command::On));
        assert!(controller.apply(Command::Off));
        let state = controller.state();
        assert!(!state.enabled);
        assert_eq!(state.fan_level, FanLevel::Medium);
        assert_eq!(state.temperature, 40);
        assert_eq!(controller.release().frames.len(), 4);
    }

    #[test]
    fn test_send_current_matches_encoder() {
        let state = DeviceState {
            enabled: true,
            mode: Mode::Heat,
            temperature: 27,
            fan_level: FanLevel::Low,
        };
        let mut controller = Controller::with_state(RecordingSender::default(), state);
        let frame = controller.send_current();
        assert_eq!(frame, encode(&state));
        assert_eq!(controller.sender().frames, [frame]);
    }

    #[test]
    fn test_drives_interrupt_transmitter() {
        let pin = PinMock::new(&[Transaction::set(PinState::Low)]);
        let transmitter = IrTransmitter::new(pin, FreeRunning, 42);
        let mut controller = Controller::new(transmitter);

        let _ = controller.handle("heat");
        assert!(!controller.sender().is_idle());
        let _ = controller.handle("nonsense");
        assert_eq!(controller.sender().sent_frames, 0);

        let mut transmitter = controller.release();
        transmitter.pin.done();
    }
}
