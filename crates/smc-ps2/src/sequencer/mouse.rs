//! Mouse init sequencer.
//!
//! Negotiates BAT, device identity and the Intellimouse extensions, then
//! configures the sample rate and enables reporting. Identity policy:
//! request ID 4 (wheel + 5 buttons); a probe that still answers 0
//! downgrades the request to 3 (wheel) and re-enters reset; a second miss
//! downgrades to 0 (standard). Deterministic, at most two extra resets.

use tracing::debug;

use crate::codes;
use crate::commands;
use crate::transceiver::CommandStatus;

use super::{CommandPort, Watchdog, WATCHDOG_TICKS};

/// Intellimouse sample-rate knock that unlocks wheel reporting.
const KNOCK_RATE_1: u8 = 200;
const KNOCK_RATE_2_WHEEL: u8 = 100;
const KNOCK_RATE_2_5BUTTON: u8 = 200;
const KNOCK_RATE_3: u8 = 80;
/// Steady-state sample rate once negotiation is done.
const OPERATING_RATE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseState {
    Off,
    /// Waiting for the power-on (or post-reset) self test result.
    BatWait,
    /// Waiting for the device ID byte that follows BAT.
    IdWait,
    /// Intellimouse knock: three sample-rate writes, then read-device-type.
    Knock1,
    Knock1Ack,
    Knock2,
    Knock2Ack,
    Knock3,
    Knock3Ack,
    ReadId,
    ReadIdAck,
    /// Waiting for the ID byte answering read-device-type.
    IdByteWait,
    SetSampleRate,
    SetSampleRateAck,
    Enable,
    EnableAck,
    Ready,
    Failed,
    Reset,
    ResetAck,
}

#[derive(Debug)]
pub struct MouseSequencer {
    state: MouseState,
    watchdog: Watchdog<MouseState>,
    mouse_id: u8,
    requested_id: u8,
}

impl MouseSequencer {
    pub fn new() -> Self {
        Self {
            state: MouseState::Off,
            watchdog: Watchdog::new(),
            mouse_id: codes::BAT_FAIL,
            requested_id: 4,
        }
    }

    pub fn state(&self) -> MouseState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == MouseState::Ready
    }

    /// Negotiated device ID (0, 3 or 4); `BAT_FAIL` until known.
    pub fn mouse_id(&self) -> u8 {
        self.mouse_id
    }

    /// Wire packet length for the negotiated ID: 3 bytes for a standard
    /// mouse, 4 once any Intellimouse extension is active.
    pub fn packet_size(&self) -> u8 {
        if self.mouse_id == 0 {
            3
        } else {
            4
        }
    }

    /// Identity the negotiation is currently aiming for.
    pub fn requested_id(&self) -> u8 {
        self.requested_id
    }

    /// Host override of the identity negotiation target (0, 3 or 4).
    /// Re-enters the reset sequence.
    pub fn set_requested_id(&mut self, id: u8) {
        self.requested_id = if id == 3 || id == 4 { id } else { 0 };
        self.state = MouseState::Reset;
    }

    /// Forces a device reset on the next tick.
    pub fn request_reset(&mut self) {
        self.state = MouseState::Reset;
    }

    /// One periodic-timer step. `powered` is the system power rail state;
    /// deasserting it overrides everything.
    pub fn tick(&mut self, port: &mut dyn CommandPort, powered: bool) {
        if !powered {
            if self.state != MouseState::Off {
                debug!("mouse sequencer: power lost, abandoning init");
                port.flush();
                self.state = MouseState::Off;
                self.watchdog.disarm();
            }
            return;
        }

        // Expiry overrides a command that never got its response; the
        // expiry state must run now so its own command (and watchdog) can
        // be issued, otherwise a dead device pends forever.
        let mut expired = false;
        if let Some(expiry) = self.watchdog.tick() {
            debug!(?expiry, from = ?self.state, "mouse watchdog expired");
            self.state = expiry;
            expired = true;
        }

        // Otherwise a command still shifting onto the wire runs to
        // completion before the state machine moves.
        if !expired && port.command_status() == CommandStatus::Pending {
            return;
        }

        match self.state {
            MouseState::Off => {
                self.mouse_id = codes::BAT_FAIL;
                self.state = MouseState::BatWait;
                self.arm();
            }

            MouseState::BatWait => {
                if let Some(byte) = port.next() {
                    match byte {
                        codes::BAT_OK => {
                            self.state = MouseState::IdWait;
                            self.arm();
                        }
                        codes::BAT_FAIL => {
                            self.state = MouseState::Failed;
                            self.watchdog.disarm();
                        }
                        // Stray byte; the watchdog decides.
                        _ => {}
                    }
                }
            }

            MouseState::IdWait => {
                if let Some(id) = port.next() {
                    if id == 0 {
                        self.mouse_id = 0;
                        self.state = if self.requested_id >= 3 {
                            MouseState::Knock1
                        } else {
                            MouseState::SetSampleRate
                        };
                    } else {
                        self.mouse_id = codes::BAT_FAIL;
                        self.state = MouseState::Reset;
                    }
                    self.arm();
                }
            }

            MouseState::Knock1 => {
                port.send_command_with_param(commands::SET_SAMPLE_RATE, KNOCK_RATE_1);
                self.state = MouseState::Knock1Ack;
                self.arm();
            }
            MouseState::Knock1Ack => self.after_ack(MouseState::Knock2, port),

            MouseState::Knock2 => {
                let rate = if self.requested_id == 3 {
                    KNOCK_RATE_2_WHEEL
                } else {
                    KNOCK_RATE_2_5BUTTON
                };
                port.send_command_with_param(commands::SET_SAMPLE_RATE, rate);
                self.state = MouseState::Knock2Ack;
                self.arm();
            }
            MouseState::Knock2Ack => self.after_ack(MouseState::Knock3, port),

            MouseState::Knock3 => {
                port.send_command_with_param(commands::SET_SAMPLE_RATE, KNOCK_RATE_3);
                self.state = MouseState::Knock3Ack;
                self.arm();
            }
            MouseState::Knock3Ack => self.after_ack(MouseState::ReadId, port),

            MouseState::ReadId => {
                port.send_command(commands::READ_DEVICE_TYPE);
                self.state = MouseState::ReadIdAck;
                self.arm();
            }
            MouseState::ReadIdAck => self.after_ack(MouseState::IdByteWait, port),

            MouseState::IdByteWait => {
                if let Some(id) = port.next() {
                    self.watchdog.disarm();
                    if id == self.requested_id || (id == 0 && self.requested_id == 3) {
                        // Negotiation done (possibly a plain downgrade from
                        // wheel to standard).
                        self.mouse_id = id;
                        self.state = MouseState::SetSampleRate;
                    } else if id == 0 && self.requested_id == 4 {
                        self.requested_id = 3;
                        self.state = MouseState::Reset;
                    } else {
                        self.requested_id = 0;
                        self.state = MouseState::Reset;
                    }
                }
            }

            MouseState::SetSampleRate => {
                port.send_command_with_param(commands::SET_SAMPLE_RATE, OPERATING_RATE);
                self.state = MouseState::SetSampleRateAck;
                self.arm();
            }
            MouseState::SetSampleRateAck => self.after_ack(MouseState::Enable, port),

            MouseState::Enable => {
                port.send_command(commands::ENABLE_REPORTING);
                self.state = MouseState::EnableAck;
                self.arm();
            }
            MouseState::EnableAck => {
                if port.command_status() == CommandStatus::Acked {
                    self.state = MouseState::Ready;
                    self.watchdog.disarm();
                } else if port.command_status() == CommandStatus::Errored {
                    self.state = MouseState::Reset;
                }
            }

            MouseState::Ready | MouseState::Failed => {
                self.watchdog.disarm();
            }

            MouseState::Reset => {
                debug!(requested_id = self.requested_id, "mouse reset");
                self.mouse_id = codes::BAT_FAIL;
                port.flush();
                port.send_command(commands::RESET);
                self.state = MouseState::ResetAck;
                self.arm();
            }
            MouseState::ResetAck => {
                match port.command_status() {
                    CommandStatus::Acked => {
                        // No flush here: a prompt device sends ACK, BAT and
                        // ID in one burst, and the BAT/ID bytes are already
                        // queued. The Reset arm flushed before sending.
                        self.state = MouseState::BatWait;
                        self.arm();
                    }
                    CommandStatus::Errored => {
                        self.state = MouseState::Reset;
                    }
                    // Idle: watchdog covers a device that never answers.
                    _ => {}
                }
            }
        }
    }

    /// Shared ACK-wait step: Acked advances, Resend re-enters reset, and
    /// the watchdog handles silence.
    fn after_ack(&mut self, next: MouseState, port: &mut dyn CommandPort) {
        match port.command_status() {
            CommandStatus::Acked => {
                self.state = next;
                self.arm();
            }
            CommandStatus::Errored => {
                self.state = MouseState::Reset;
            }
            _ => {}
        }
    }

    fn arm(&mut self) {
        self.watchdog.arm(WATCHDOG_TICKS, MouseState::Reset);
    }
}

impl Default for MouseSequencer {
    fn default() -> Self {
        Self::new()
    }
}
