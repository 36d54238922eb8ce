//! Keyboard init sequencer: BAT, status-indicator (LED) setup, ready.

use tracing::debug;

use crate::codes;
use crate::commands;
use crate::transceiver::CommandStatus;

use super::{CommandPort, Watchdog, WATCHDOG_TICKS};

/// State byte values exposed over the register map. `READY` is read by host
/// boot firmware and must stay stable.
pub const KBD_STATE_OFF: u8 = 0x00;
pub const KBD_STATE_READY: u8 = 0x01;
pub const KBD_STATE_BAT: u8 = 0x02;
pub const KBD_STATE_SET_LEDS: u8 = 0x03;
pub const KBD_STATE_SET_LEDS_ACK: u8 = 0x04;
pub const KBD_STATE_RESET: u8 = 0x10;
pub const KBD_STATE_RESET_ACK: u8 = 0x11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardState {
    Off,
    BatWait,
    SetLeds,
    SetLedsAck,
    Ready,
    Reset,
    ResetAck,
}

impl KeyboardState {
    /// Register-map encoding of the state.
    pub fn as_reg(self) -> u8 {
        match self {
            KeyboardState::Off => KBD_STATE_OFF,
            KeyboardState::BatWait => KBD_STATE_BAT,
            KeyboardState::SetLeds => KBD_STATE_SET_LEDS,
            KeyboardState::SetLedsAck => KBD_STATE_SET_LEDS_ACK,
            KeyboardState::Ready => KBD_STATE_READY,
            KeyboardState::Reset => KBD_STATE_RESET,
            KeyboardState::ResetAck => KBD_STATE_RESET_ACK,
        }
    }
}

#[derive(Debug)]
pub struct KeyboardSequencer {
    state: KeyboardState,
    watchdog: Watchdog<KeyboardState>,
    leds: u8,
}

impl KeyboardSequencer {
    pub fn new() -> Self {
        Self {
            state: KeyboardState::Off,
            watchdog: Watchdog::new(),
            // Num Lock on after power-up, matching the BAT default hosts
            // expect.
            leds: 0x02,
        }
    }

    pub fn state(&self) -> KeyboardState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == KeyboardState::Ready
    }

    pub fn leds(&self) -> u8 {
        self.leds
    }

    /// Updates the status indicators. If the keyboard is already up the
    /// `0xED` command is reissued immediately; otherwise the value is used
    /// when init reaches the LED step.
    pub fn set_leds(&mut self, mask: u8) {
        self.leds = mask & 0x07;
        if self.state == KeyboardState::Ready {
            self.state = KeyboardState::SetLeds;
        }
    }

    /// Forces a device reset on the next tick.
    pub fn request_reset(&mut self) {
        self.state = KeyboardState::Reset;
    }

    pub fn tick(&mut self, port: &mut dyn CommandPort, powered: bool) {
        if !powered {
            if self.state != KeyboardState::Off {
                debug!("keyboard sequencer: power lost, abandoning init");
                port.flush();
                self.state = KeyboardState::Off;
                self.watchdog.disarm();
            }
            return;
        }

        // Expiry overrides a command that never got its response; the
        // expiry state must run now so its own command (and watchdog) can
        // be issued, otherwise a dead device pends forever.
        let mut expired = false;
        if let Some(expiry) = self.watchdog.tick() {
            debug!(?expiry, from = ?self.state, "keyboard watchdog expired");
            self.state = expiry;
            expired = true;
        }

        if !expired && port.command_status() == CommandStatus::Pending {
            return;
        }

        match self.state {
            KeyboardState::Off => {
                self.state = KeyboardState::BatWait;
                self.arm();
            }

            KeyboardState::BatWait => match port.take_bat() {
                Some(codes::BAT_OK) => {
                    self.state = KeyboardState::SetLeds;
                    self.arm();
                }
                Some(_) => {
                    self.state = KeyboardState::Reset;
                    self.arm();
                }
                None => {}
            },

            KeyboardState::SetLeds => {
                port.send_command_with_param(commands::SET_LEDS, self.leds);
                self.state = KeyboardState::SetLedsAck;
                self.arm();
            }

            KeyboardState::SetLedsAck => match port.command_status() {
                CommandStatus::Acked => {
                    self.state = KeyboardState::Ready;
                    self.watchdog.disarm();
                }
                CommandStatus::Errored => {
                    self.state = KeyboardState::Reset;
                }
                _ => {}
            },

            KeyboardState::Ready => {}

            KeyboardState::Reset => {
                port.flush();
                port.send_command(commands::RESET);
                self.state = KeyboardState::ResetAck;
                self.arm();
            }

            KeyboardState::ResetAck => match port.command_status() {
                CommandStatus::Acked => {
                    self.state = KeyboardState::BatWait;
                    self.arm();
                }
                CommandStatus::Errored => {
                    self.state = KeyboardState::Reset;
                }
                _ => {}
            },
        }
    }

    fn arm(&mut self) {
        self.watchdog.arm(WATCHDOG_TICKS, KeyboardState::Reset);
    }
}

impl Default for KeyboardSequencer {
    fn default() -> Self {
        Self::new()
    }
}
