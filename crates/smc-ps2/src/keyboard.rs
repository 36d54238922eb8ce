//! Scan-code decoder for the keyboard port.
//!
//! Consumes raw Set-2 bytes from the transceiver, tracks multi-byte
//! sequences and modifier state, and emits one IBM key-number byte per key
//! event into the port's ring buffer (break form = number | 0x80).
//!
//! Buffer pressure never loses modifier state: while the overrun flag is
//! set, ordinary key events are dropped but the modifier bitmask keeps
//! updating, and the accumulated delta is replayed as synthetic make/break
//! codes once the buffer has drained and no sequence is in flight.

use bitflags::bitflags;
use tracing::trace;

use crate::codes;
use crate::keymap::{self, KEY_DELETE, KEY_PAUSE, KEY_PRTSCR};
use crate::ring::RingBuffer;

/// Break (key release) marker in the emitted key-code byte.
pub const BREAK_BIT: u8 = 0x80;

/// Number of bytes in the Pause make sequence after the `0xE1` lead-in.
const PAUSE_TAIL: u8 = 7;

bitflags! {
    /// Modifier keys currently held, one bit per physical key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const LSHIFT = 0x01;
        const LCTRL = 0x02;
        const LALT = 0x04;
        const LMETA = 0x08;
        const RSHIFT = 0x10;
        const RCTRL = 0x20;
        const RALT = 0x40;
        const RMETA = 0x80;
    }
}

/// Modifier bit <-> key number pairs, one per physical modifier key.
const MODIFIER_KEYS: [(Modifiers, u8); 8] = [
    (Modifiers::LSHIFT, keymap::KEY_LSHIFT),
    (Modifiers::LCTRL, keymap::KEY_LCTRL),
    (Modifiers::LALT, keymap::KEY_LALT),
    (Modifiers::LMETA, keymap::KEY_LMETA),
    (Modifiers::RSHIFT, keymap::KEY_RSHIFT),
    (Modifiers::RCTRL, keymap::KEY_RCTRL),
    (Modifiers::RALT, keymap::KEY_RALT),
    (Modifiers::RMETA, keymap::KEY_RMETA),
];

impl Modifiers {
    fn for_keynum(key: u8) -> Option<Modifiers> {
        MODIFIER_KEYS
            .iter()
            .find(|&&(_, k)| k == key)
            .map(|&(bit, _)| bit)
    }

    fn ctrl(self) -> bool {
        self.intersects(Modifiers::LCTRL | Modifiers::RCTRL)
    }

    fn alt(self) -> bool {
        self.intersects(Modifiers::LALT | Modifiers::RALT)
    }
}

/// Where the decoder is inside a multi-byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Idle,
    /// After `0xF0`.
    BreakPrefix,
    /// After `0xE0`.
    ExtendedPrefix,
    /// After `0xE0 0xF0`.
    ExtendedBreakPrefix,
    /// Inside the 8-byte Pause sequence; counts consumed tail bytes.
    Pause(u8),
    /// After `0xAB`: one more ID byte follows.
    IdResponse,
}

#[derive(Debug)]
pub struct ScancodeDecoder {
    state: DecodeState,
    modifiers: Modifiers,
    /// Modifier state as last observed by the consumer; diverges from
    /// `modifiers` only while the overrun flag is set.
    seen_modifiers: Modifiers,
    overrun: bool,
    reset_requested: bool,
    nmi_requested: bool,
    bat: Option<u8>,
}

impl ScancodeDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Idle,
            modifiers: Modifiers::empty(),
            seen_modifiers: Modifiers::empty(),
            overrun: false,
            reset_requested: false,
            nmi_requested: false,
            bat: None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// BAT result latched from the device, if one arrived since the last
    /// call. Drained by the init sequencer.
    pub fn take_bat(&mut self) -> Option<u8> {
        self.bat.take()
    }

    /// One-shot Ctrl+Alt+Del latch.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    /// One-shot Ctrl+Alt+PrtScr latch.
    pub fn take_nmi_request(&mut self) -> bool {
        std::mem::take(&mut self.nmi_requested)
    }

    /// Drops any in-flight sequence state (new-frame recovery, power loss).
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
        self.modifiers = Modifiers::empty();
        self.seen_modifiers = Modifiers::empty();
        self.overrun = false;
        self.bat = None;
    }

    /// True when modifier deltas are waiting for the buffer to drain.
    pub fn replay_pending(&self) -> bool {
        self.overrun && self.state == DecodeState::Idle
    }

    /// Number of synthetic bytes a replay would emit right now.
    pub fn pending_replay_len(&self) -> u8 {
        if self.replay_pending() {
            (self.modifiers.bits() ^ self.seen_modifiers.bits()).count_ones() as u8
        } else {
            0
        }
    }

    /// Replays accumulated modifier deltas into a drained buffer and clears
    /// the overrun flag. Call only when the buffer is empty.
    pub fn maybe_replay<const N: usize>(&mut self, buf: &mut RingBuffer<N>) {
        if !self.replay_pending() || buf.available() {
            return;
        }
        let delta = self.modifiers ^ self.seen_modifiers;
        for &(bit, key) in MODIFIER_KEYS.iter() {
            if !delta.contains(bit) {
                continue;
            }
            let code = if self.modifiers.contains(bit) {
                key
            } else {
                key | BREAK_BIT
            };
            if !buf.push(code) {
                // Still no room; keep the flag and retry on the next drain.
                return;
            }
            self.seen_modifiers.toggle(bit);
        }
        self.overrun = false;
    }

    /// Feeds one raw byte from the transceiver.
    pub fn process<const N: usize>(&mut self, byte: u8, buf: &mut RingBuffer<N>) {
        // A drained buffer releases the deferred modifier deltas before any
        // new event is queued behind them.
        if buf.is_empty() {
            self.maybe_replay(buf);
        }

        match self.state {
            DecodeState::Idle => match byte {
                codes::BAT_OK | codes::BAT_FAIL => self.bat = Some(byte),
                0xF0 => self.state = DecodeState::BreakPrefix,
                0xE0 => self.state = DecodeState::ExtendedPrefix,
                0xE1 => self.state = DecodeState::Pause(0),
                0xAB => self.state = DecodeState::IdResponse,
                code => self.translate(code, false, false, buf),
            },
            DecodeState::BreakPrefix => {
                self.state = DecodeState::Idle;
                self.translate(byte, false, true, buf);
            }
            DecodeState::ExtendedPrefix => match byte {
                0xF0 => self.state = DecodeState::ExtendedBreakPrefix,
                code => {
                    self.state = DecodeState::Idle;
                    self.translate(code, true, false, buf);
                }
            },
            DecodeState::ExtendedBreakPrefix => {
                self.state = DecodeState::Idle;
                self.translate(byte, true, true, buf);
            }
            DecodeState::Pause(step) => {
                if step + 1 < PAUSE_TAIL {
                    self.state = DecodeState::Pause(step + 1);
                } else {
                    // Pause has no separate break sequence; emit the pair.
                    self.state = DecodeState::Idle;
                    self.emit_pair(KEY_PAUSE, buf);
                }
            }
            DecodeState::IdResponse => {
                // Second byte of the 0xAB keyboard ID; not a key event.
                self.state = DecodeState::Idle;
            }
        }
    }

    fn translate<const N: usize>(
        &mut self,
        code: u8,
        extended: bool,
        release: bool,
        buf: &mut RingBuffer<N>,
    ) {
        let key = if extended {
            keymap::extended_keynum(code)
        } else {
            keymap::base_keynum(code)
        };
        let Some(key) = key else {
            return;
        };

        if let Some(bit) = Modifiers::for_keynum(key) {
            self.modifiers.set(bit, !release);
        } else if !release && self.modifiers.ctrl() && self.modifiers.alt() {
            if key == KEY_DELETE {
                self.reset_requested = true;
            } else if key == KEY_PRTSCR {
                self.nmi_requested = true;
            }
        }

        if self.overrun {
            // Dropped, but modifier state above stays current; deltas are
            // replayed once the consumer catches up.
            return;
        }

        let code = if release { key | BREAK_BIT } else { key };
        if buf.push(code) {
            if let Some(bit) = Modifiers::for_keynum(key) {
                self.seen_modifiers.set(bit, !release);
            }
        } else {
            trace!(key, "keyboard buffer overrun");
            self.overrun = true;
        }
    }

    /// Emits a make+break pair atomically: both bytes or neither.
    fn emit_pair<const N: usize>(&mut self, key: u8, buf: &mut RingBuffer<N>) {
        if self.overrun {
            return;
        }
        if !buf.push(key) {
            self.overrun = true;
            return;
        }
        if !buf.push(key | BREAK_BIT) {
            // Never leave a truncated pair for the consumer.
            buf.rewind(1);
            self.overrun = true;
        }
    }
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}
