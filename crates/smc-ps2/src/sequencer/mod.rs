//! Device init sequencers.
//!
//! One watchdog-guarded state machine per peripheral, ticked from the
//! periodic timer. Sequencers talk to the transceiver only through the
//! [`CommandPort`] seam so tests can script a fake port.

mod keyboard;
mod mouse;
mod watchdog;

pub use keyboard::{
    KeyboardSequencer, KeyboardState, KBD_STATE_BAT, KBD_STATE_OFF, KBD_STATE_READY,
    KBD_STATE_RESET, KBD_STATE_RESET_ACK, KBD_STATE_SET_LEDS, KBD_STATE_SET_LEDS_ACK,
};
pub use mouse::{MouseSequencer, MouseState};
pub use watchdog::Watchdog;

use crate::transceiver::{CommandStatus, Ps2Port};

/// Tick budget granted to every response wait before the watchdog forces
/// the expiry state.
pub const WATCHDOG_TICKS: u16 = 255;

/// What a sequencer needs from its transceiver.
pub trait CommandPort {
    fn available(&self) -> bool;
    fn next(&mut self) -> Option<u8>;
    fn flush(&mut self);
    fn send_command(&mut self, cmd: u8);
    fn send_command_with_param(&mut self, cmd: u8, param: u8);
    fn command_status(&self) -> CommandStatus;
    /// Latched BAT byte, if the decoder has seen one (keyboard only).
    fn take_bat(&mut self) -> Option<u8>;
}

impl<const N: usize> CommandPort for crate::transceiver::Ps2Port<N> {
    fn available(&self) -> bool {
        Ps2Port::available(self)
    }

    fn next(&mut self) -> Option<u8> {
        Ps2Port::next(self)
    }

    fn flush(&mut self) {
        Ps2Port::flush(self)
    }

    fn send_command(&mut self, cmd: u8) {
        Ps2Port::send_command(self, cmd)
    }

    fn send_command_with_param(&mut self, cmd: u8, param: u8) {
        Ps2Port::send_command_with_param(self, cmd, param)
    }

    fn command_status(&self) -> CommandStatus {
        Ps2Port::command_status(self)
    }

    fn take_bat(&mut self) -> Option<u8> {
        self.keyboard().and_then(|dec| dec.take_bat())
    }
}
